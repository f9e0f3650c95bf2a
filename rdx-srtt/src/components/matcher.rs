//! Context lookup: which location does a sequence put after a given context?

use crate::common::{Location, SequenceId};
use crate::components::pair::SequencePair;
use crate::components::sequence::CyclicSequence;

/// Returns the location that `sequence` places right after `context`, or
/// `None` if the context never occurs in the sequence or its length differs
/// from the sequence's order.
///
/// Every circular offset is scanned. A validated sequence has at most one
/// successor per context; debug builds keep scanning after the first match and
/// assert that every further match agrees.
pub fn find_successor(context: &[Location], sequence: &CyclicSequence) -> Option<Location> {
    if context.len() != sequence.order() {
        return None;
    }
    let mut found = None;
    for offset in 0..sequence.len() {
        if !sequence.window_equals(offset, context) {
            continue;
        }
        let next = sequence.at(offset + context.len());
        if !cfg!(debug_assertions) {
            return Some(next);
        }
        if let Some(previous) = found {
            debug_assert_eq!(
                previous, next,
                "context {context:?} has two successors in sequence {sequence}"
            );
        }
        found = Some(next);
    }
    found
}

/// Looks `context` up in the sequence of `pair` selected by `id`.
pub fn predict(context: &[Location], pair: &SequencePair, id: SequenceId) -> Option<Location> {
    find_successor(context, pair.get(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq1() -> CyclicSequence {
        CyclicSequence::from_digits(&[0, 1, 0, 3, 2, 1, 3, 0, 2, 3, 1, 2], 4, 2)
            .expect("valid sequence")
    }

    #[test]
    fn finds_successor_of_first_window() {
        assert_eq!(
            find_successor(&[Location(0), Location(1)], &seq1()),
            Some(Location(0))
        );
    }

    #[test]
    fn finds_successor_across_the_wrap() {
        // Window "12" sits at offset 10; its successor wraps to offset 0.
        assert_eq!(
            find_successor(&[Location(1), Location(2)], &seq1()),
            Some(Location(0))
        );
    }

    #[test]
    fn unknown_context_is_not_found() {
        assert_eq!(find_successor(&[Location(1), Location(1)], &seq1()), None);
    }

    #[test]
    fn context_of_the_wrong_length_is_not_found() {
        let seq = seq1();
        assert_eq!(find_successor(&[Location(0)], &seq), None);
        assert_eq!(
            find_successor(&[Location(0), Location(1), Location(0)], &seq),
            None
        );
        assert_eq!(find_successor(&[], &seq), None);
    }

    #[test]
    fn every_offset_maps_to_its_own_successor() {
        let seq = seq1();
        for offset in 0..seq.len() {
            assert_eq!(
                find_successor(&seq.window(offset), &seq),
                Some(seq.successor(offset))
            );
        }
    }
}
