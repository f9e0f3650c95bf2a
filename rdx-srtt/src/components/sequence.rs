//! The validated, immutable cyclic sequence.

use crate::common::Location;
use crate::error::SrttError;
use std::fmt;

/// A circular sequence of locations in which every `order`-long window has a
/// single deterministic successor.
///
/// Index arithmetic is modulo the sequence length. The only way to obtain a
/// `CyclicSequence` is [`CyclicSequence::new`], which rejects sequences that
/// break the determinism invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicSequence {
    items: Vec<Location>,
    alphabet: usize,
    order: usize,
}

impl CyclicSequence {
    /// Validates `items` as a sequence over `alphabet` locations with the given
    /// conditional order.
    pub fn new(items: Vec<Location>, alphabet: usize, order: usize) -> Result<Self, SrttError> {
        if items.is_empty() {
            return Err(SrttError::InvalidParameters(
                "a sequence needs at least one item".to_string(),
            ));
        }
        if order == 0 {
            return Err(SrttError::InvalidParameters(
                "conditional order must be at least 1".to_string(),
            ));
        }
        if let Some(&location) = items.iter().find(|l| l.index() >= alphabet) {
            return Err(SrttError::LocationOutOfRange { location, alphabet });
        }

        let sequence = Self {
            items,
            alphabet,
            order,
        };
        sequence.check_deterministic()?;
        Ok(sequence)
    }

    /// Builds a sequence from raw integers, as found in configuration files.
    pub fn from_digits(digits: &[u8], alphabet: usize, order: usize) -> Result<Self, SrttError> {
        Self::new(digits.iter().copied().map(Location).collect(), alphabet, order)
    }

    fn check_deterministic(&self) -> Result<(), SrttError> {
        let len = self.len();
        for first in 0..len {
            for second in (first + 1)..len {
                if self.windows_match(first, self, second)
                    && self.successor(first) != self.successor(second)
                {
                    return Err(SrttError::NonDeterministic {
                        context: self.window(first),
                        first,
                        second,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn alphabet(&self) -> usize {
        self.alphabet
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn items(&self) -> &[Location] {
        &self.items
    }

    /// The item at circular offset `index`.
    pub fn at(&self, index: usize) -> Location {
        self.items[index % self.items.len()]
    }

    /// The `order`-long window starting at circular offset `index`.
    pub fn window(&self, index: usize) -> Vec<Location> {
        (0..self.order).map(|k| self.at(index + k)).collect()
    }

    /// The item following the window that starts at `index`.
    pub fn successor(&self, index: usize) -> Location {
        self.at(index + self.order)
    }

    /// Whether the window of `self` at `index` equals `context` element-wise.
    pub fn window_equals(&self, index: usize, context: &[Location]) -> bool {
        context
            .iter()
            .enumerate()
            .all(|(k, &location)| self.at(index + k) == location)
    }

    /// Whether the window of `self` at `index` equals the window of `other` at
    /// `other_index`, both taken with `self`'s order.
    pub fn windows_match(&self, index: usize, other: &CyclicSequence, other_index: usize) -> bool {
        (0..self.order).all(|k| self.at(index + k) == other.at(other_index + k))
    }

    /// The sequence as a string of location digits, used in the log header.
    ///
    /// One character per item as long as the alphabet has at most ten
    /// locations, which session configs enforce.
    pub fn digits(&self) -> String {
        self.items.iter().map(|l| l.to_string()).collect()
    }
}

impl fmt::Display for CyclicSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQ1: [u8; 12] = [0, 1, 0, 3, 2, 1, 3, 0, 2, 3, 1, 2];

    #[test]
    fn reference_sequence_is_deterministic() {
        let seq = CyclicSequence::from_digits(&SEQ1, 4, 2).expect("valid sequence");
        assert_eq!(seq.len(), 12);
        assert_eq!(seq.window(11), vec![Location(2), Location(0)]);
        assert_eq!(seq.successor(11), Location(1));
        assert_eq!(seq.digits(), "010321302312");
    }

    #[test]
    fn rejects_out_of_range_location() {
        let err = CyclicSequence::from_digits(&[0, 1, 4], 4, 1).unwrap_err();
        assert!(matches!(
            err,
            SrttError::LocationOutOfRange {
                location: Location(4),
                alphabet: 4
            }
        ));
    }

    #[test]
    fn rejects_ambiguous_context() {
        // "01" is followed by 2 at offset 0 and by 3 at offset 3.
        let err = CyclicSequence::from_digits(&[0, 1, 2, 0, 1, 3], 4, 2).unwrap_err();
        assert!(matches!(
            err,
            SrttError::NonDeterministic {
                first: 0,
                second: 3,
                ..
            }
        ));
    }

    #[test]
    fn repeated_context_with_same_successor_is_fine() {
        assert!(CyclicSequence::from_digits(&[0, 1, 2, 0, 1, 2], 3, 2).is_ok());
    }

    #[test]
    fn rejects_empty_sequence_and_zero_order() {
        assert!(CyclicSequence::from_digits(&[], 4, 2).is_err());
        assert!(CyclicSequence::from_digits(&[0, 1], 4, 0).is_err());
    }
}
