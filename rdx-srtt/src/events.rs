//! Defines the events broadcast by the `SrttEngine` during a session.
//!
//! Front ends and observers subscribe to this stream instead of polling the
//! engine. Every event is a plain value; nothing here gives access to the
//! engine's mutable state.

use crate::common::{Location, SequenceId};
use crate::components::selector::EmissionRecord;
use std::path::PathBuf;

/// Session lifecycle and per-trial events.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Fired once the regular and irregular sequences are fixed.
    SequencesReady { regular: String, irregular: String },
    /// Fired when the participant gives the "begin" signal.
    SessionStarted {
        participant_id: u32,
        log_path: Option<PathBuf>,
    },
    /// Fired when a stimulus is put on screen.
    StimulusShown {
        block: usize,
        trial: usize,
        location: Location,
        sequence: SequenceId,
    },
    /// Fired after each answered trial, with the record written to the log.
    TrialCompleted(EmissionRecord),
    /// Fired when a block ends and more blocks remain.
    BlockPaused { completed_block: usize },
    /// Fired when the participant leaves a pause.
    BlockResumed { block: usize },
    /// Fired when the last trial of the last block has been answered.
    SessionFinished { trials: usize },
    /// Fired when the participant quits before the end.
    SessionAborted { trials: usize },
}
