//! Typed errors raised by the sequence components and the trial state machine.

use crate::common::{Location, SequenceId};
use crate::components::selector::TaskState;

/// Errors from sequence construction, pair validation and live trials.
#[derive(Debug, thiserror::Error)]
pub enum SrttError {
    #[error("invalid sequence parameters: {0}")]
    InvalidParameters(String),

    #[error("location {location} is outside the alphabet of size {alphabet}")]
    LocationOutOfRange { location: Location, alphabet: usize },

    #[error(
        "sequence is not deterministic: context {context:?} at offsets {first} and {second} has different successors"
    )]
    NonDeterministic {
        context: Vec<Location>,
        first: usize,
        second: usize,
    },

    #[error(
        "could not construct a sequence over {alphabet} locations with order {order} after {attempts} attempt(s)"
    )]
    ConstructionExhausted {
        alphabet: usize,
        order: usize,
        attempts: usize,
    },

    #[error("regular and irregular sequences are identical")]
    IdenticalSequences,

    #[error("sequences collide: context {context:?} is followed by {successor} in both")]
    PairCollision {
        context: Vec<Location>,
        successor: Location,
    },

    #[error("no collision-free sequence pair found after {rounds} round(s) of {candidates} candidate(s)")]
    PairExhausted { rounds: usize, candidates: usize },

    #[error("context {context:?} has no successor in the {sequence} sequence")]
    UnmappedContext {
        context: Vec<Location>,
        sequence: SequenceId,
    },

    #[error("invalid transition: cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: TaskState,
    },

    #[error("stimulus for block {block}, trial {trial} was answered before it was presented")]
    StimulusNotPresented { block: usize, trial: usize },

    #[error("clock went backwards: {later}us is earlier than {earlier}us")]
    ClockWentBackwards { earlier: u64, later: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
