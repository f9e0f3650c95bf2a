//! The regular/irregular sequence pair and its collision check.
//!
//! Two sequences collide when some context occurs in both and is followed by
//! the same location in both. A collision-free pair shares contexts but never
//! their continuations, so a participant cannot tell the sequences apart from
//! local structure, only from how often each transition shows up.

use crate::common::{Location, SequenceId};
use crate::components::builder::SequenceBuilder;
use crate::components::sequence::CyclicSequence;
use crate::error::SrttError;
use rand::Rng;
use tracing::{debug, info, warn};

/// A context shared by two sequences with the same successor in both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub offset_a: usize,
    pub offset_b: usize,
    pub context: Vec<Location>,
    pub successor: Location,
}

/// Finds the first collision between `a` and `b` for contexts of length `order`.
pub fn find_collision(a: &CyclicSequence, b: &CyclicSequence, order: usize) -> Option<Collision> {
    for i in 0..a.len() {
        for j in 0..b.len() {
            let same_window = (0..order).all(|k| a.at(i + k) == b.at(j + k));
            if same_window && a.at(i + order) == b.at(j + order) {
                return Some(Collision {
                    offset_a: i,
                    offset_b: j,
                    context: (0..order).map(|k| a.at(i + k)).collect(),
                    successor: a.at(i + order),
                });
            }
        }
    }
    None
}

/// Whether `a` and `b` may be used together: not identical and collision-free.
pub fn validate(a: &CyclicSequence, b: &CyclicSequence, order: usize) -> bool {
    a.items() != b.items() && find_collision(a, b, order).is_none()
}

/// Retry limits for [`SequencePair::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairPolicy {
    /// Second sequences tried against one first sequence.
    pub max_candidates: usize,
    /// Times both sequences are rebuilt once the candidates ran out.
    pub max_rounds: usize,
}

impl Default for PairPolicy {
    fn default() -> Self {
        Self {
            max_candidates: 500,
            max_rounds: 20,
        }
    }
}

/// A validated regular/irregular pair. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePair {
    regular: CyclicSequence,
    irregular: CyclicSequence,
}

impl SequencePair {
    /// Validates and pairs two sequences.
    pub fn new(regular: CyclicSequence, irregular: CyclicSequence) -> Result<Self, SrttError> {
        if regular.len() != irregular.len() {
            return Err(SrttError::InvalidParameters(format!(
                "sequences differ in length ({} vs {})",
                regular.len(),
                irregular.len()
            )));
        }
        if regular.order() != irregular.order() || regular.alphabet() != irregular.alphabet() {
            return Err(SrttError::InvalidParameters(
                "sequences differ in order or alphabet".to_string(),
            ));
        }
        if regular.items() == irregular.items() {
            return Err(SrttError::IdenticalSequences);
        }
        if let Some(collision) = find_collision(&regular, &irregular, regular.order()) {
            return Err(SrttError::PairCollision {
                context: collision.context,
                successor: collision.successor,
            });
        }
        Ok(Self { regular, irregular })
    }

    /// Builds a collision-free pair.
    ///
    /// The first sequence is kept while second sequences are rebuilt up to
    /// `policy.max_candidates` times. If none fits, both are rebuilt, up to
    /// `policy.max_rounds` rounds in total.
    pub fn generate<R: Rng + ?Sized>(
        builder: &SequenceBuilder,
        rng: &mut R,
        policy: PairPolicy,
    ) -> Result<Self, SrttError> {
        let order = builder.order();
        for round in 1..=policy.max_rounds {
            let first = builder.build(rng)?;
            for candidate in 1..=policy.max_candidates {
                let second = builder.build(rng)?;
                if validate(&first, &second, order) {
                    info!(
                        round,
                        candidate,
                        regular = %first,
                        irregular = %second,
                        "collision-free sequence pair found"
                    );
                    return Ok(Self {
                        regular: first,
                        irregular: second,
                    });
                }
            }
            debug!(round, "no partner found for first sequence, rebuilding both");
        }
        warn!(
            alphabet = builder.alphabet(),
            order, "sequence pair construction exhausted"
        );
        Err(SrttError::PairExhausted {
            rounds: policy.max_rounds,
            candidates: policy.max_candidates,
        })
    }

    /// Exchanges the roles of the two sequences.
    pub fn swap_roles(self) -> Self {
        Self {
            regular: self.irregular,
            irregular: self.regular,
        }
    }

    pub fn regular(&self) -> &CyclicSequence {
        &self.regular
    }

    pub fn irregular(&self) -> &CyclicSequence {
        &self.irregular
    }

    pub fn get(&self, id: SequenceId) -> &CyclicSequence {
        match id {
            SequenceId::Regular => &self.regular,
            SequenceId::Irregular => &self.irregular,
        }
    }

    pub fn len(&self) -> usize {
        self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_empty()
    }

    pub fn order(&self) -> usize {
        self.regular.order()
    }
}
