//! Randomized construction of deterministic cyclic sequences.
//!
//! For a conditional order of two or more, every ordered pair `(i, j)` of
//! distinct locations is a transition token. The builder chains all tokens so
//! that each token starts where the previous one ended, and reads the sequence
//! off the token heads. Each pair then occurs exactly once as a window of the
//! circular sequence, so every context has a single successor.
//!
//! Construction is a Las Vegas algorithm: a token is drawn at random and
//! rejected unless it is unused and linkable. An attempt that runs past its
//! iteration ceiling, or whose chain reaches a location with no unused
//! outgoing token, fails and is restarted from nothing.

use crate::common::Location;
use crate::components::sequence::CyclicSequence;
use crate::error::SrttError;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

/// Number of full attempts `build` makes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 1_000;

/// Length of a sequence built over `alphabet` locations with the given order.
pub fn sequence_len(alphabet: usize, order: usize) -> usize {
    if order == 1 {
        alphabet
    } else {
        alphabet * alphabet.saturating_sub(1)
    }
}

/// Builds random [`CyclicSequence`]s for one alphabet size and order.
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    alphabet: usize,
    order: usize,
    iteration_ceiling: usize,
    max_attempts: usize,
}

impl SequenceBuilder {
    /// Creates a builder. The default iteration ceiling per attempt is `M³`
    /// for a sequence of length `M`.
    pub fn new(alphabet: usize, order: usize) -> Result<Self, SrttError> {
        if alphabet < 2 {
            return Err(SrttError::InvalidParameters(format!(
                "at least 2 locations are needed, got {alphabet}"
            )));
        }
        if alphabet > u8::MAX as usize {
            return Err(SrttError::InvalidParameters(format!(
                "at most {} locations are supported, got {alphabet}",
                u8::MAX
            )));
        }
        if order == 0 {
            return Err(SrttError::InvalidParameters(
                "conditional order must be at least 1".to_string(),
            ));
        }
        let len = sequence_len(alphabet, order);
        Ok(Self {
            alphabet,
            order,
            iteration_ceiling: len.saturating_pow(3),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    pub fn with_iteration_ceiling(mut self, iterations: usize) -> Self {
        self.iteration_ceiling = iterations;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn alphabet(&self) -> usize {
        self.alphabet
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sequence_len(&self) -> usize {
        sequence_len(self.alphabet, self.order)
    }

    /// Builds a sequence, restarting failed attempts from scratch.
    ///
    /// Returns `ConstructionExhausted` once `max_attempts` attempts failed.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CyclicSequence, SrttError> {
        for attempt in 1..=self.max_attempts {
            match self.try_build(rng) {
                Ok(sequence) => {
                    debug!(attempt, sequence = %sequence, "sequence built");
                    return Ok(sequence);
                }
                Err(SrttError::ConstructionExhausted { .. }) => {
                    debug!(attempt, "sequence construction failed, restarting");
                }
                Err(other) => return Err(other),
            }
        }
        Err(self.exhausted(self.max_attempts))
    }

    /// Makes a single construction attempt.
    pub fn try_build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CyclicSequence, SrttError> {
        if self.order == 1 {
            return self.permutation(rng);
        }

        let tokens = self.transition_tokens();
        let mut placed = vec![false; tokens.len()];
        let mut chain: Vec<usize> = Vec::with_capacity(tokens.len());
        let mut iterations = 0usize;

        while chain.len() < tokens.len() {
            iterations += 1;
            if iterations > self.iteration_ceiling {
                trace!(iterations, placed = chain.len(), "iteration ceiling reached");
                return Err(self.exhausted(1));
            }

            let candidate = rng.gen_range(0..tokens.len());
            if placed[candidate] {
                continue;
            }
            let (head, tail) = tokens[candidate];
            if let Some(&last) = chain.last() {
                if tokens[last].1 != head {
                    continue;
                }
            }

            placed[candidate] = true;
            chain.push(candidate);

            let stuck = chain.len() < tokens.len()
                && !tokens
                    .iter()
                    .zip(&placed)
                    .any(|(&(next_head, _), &used)| !used && next_head == tail);
            if stuck {
                trace!(placed = chain.len(), at = %tail, "dead end");
                return Err(self.exhausted(1));
            }
        }

        let heads = chain.iter().map(|&index| tokens[index].0).collect();
        CyclicSequence::new(heads, self.alphabet, self.order).map_err(|err| {
            debug!(%err, "assembled chain failed validation");
            self.exhausted(1)
        })
    }

    fn permutation<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CyclicSequence, SrttError> {
        let mut items: Vec<Location> = (0..self.alphabet).map(|l| Location(l as u8)).collect();
        items.shuffle(rng);
        CyclicSequence::new(items, self.alphabet, self.order)
    }

    /// Every ordered pair of distinct locations.
    fn transition_tokens(&self) -> Vec<(Location, Location)> {
        let mut tokens = Vec::with_capacity(self.sequence_len());
        for i in 0..self.alphabet {
            for j in 0..self.alphabet {
                if i != j {
                    tokens.push((Location(i as u8), Location(j as u8)));
                }
            }
        }
        tokens
    }

    fn exhausted(&self, attempts: usize) -> SrttError {
        SrttError::ConstructionExhausted {
            alphabet: self.alphabet,
            order: self.order,
            attempts,
        }
    }
}
