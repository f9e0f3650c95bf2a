//! # SRTT
//!
//! A sequence engine for probabilistic Serial Reaction Time Task experiments.
//!
//! A participant sees one highlighted placeholder per trial and answers as fast
//! as possible. The order of the highlighted locations is secretly governed by
//! two hidden cyclic sequences: a *regular* one shown most of the time and an
//! *irregular* one shown rarely. Both sequences cover the same contexts but
//! never agree on what follows a context, so only the long-run frequency of
//! transitions can reveal which one is regular.
//!
//! ## Core Concepts
//!
//! - **CyclicSequence**: A circular sequence of locations in which every
//!   context of length `K` (the conditional order) has exactly one successor.
//! - **SequenceBuilder**: Builds such sequences with a randomized Las Vegas
//!   construction that either succeeds or reports a typed failure.
//! - **SequencePair**: A regular/irregular pair that is checked to be
//!   collision-free: no shared context leads to the same successor in both.
//! - **TrialSelector**: The per-trial state machine. It owns the rolling
//!   context, flips the weighted coin that picks the active sequence and emits
//!   one `EmissionRecord` per answered trial.
//! - **SrttEngine**: Drives a whole session against a `Participant`, writes the
//!   emission log and broadcasts `SessionEvent`s.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use srtt::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration (defaults, optional TOML file, SRTT__* env vars).
//!     let config = SrttConfig::load(None)?;
//!
//!     // 2. Create the engine with a clock the simulated participant can drive.
//!     let clock = Arc::new(ManualClock::new());
//!     let engine = SrttEngine::with_clock(config, clock.clone())?;
//!
//!     // 3. Subscribe to the event stream before starting the session.
//!     let mut events = engine.subscribe_session_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Received Session Event: {:?}", event);
//!         }
//!     });
//!
//!     // 4. Run a session with a simulated participant.
//!     let mut participant = SimulatedParticipant::new(clock, 7);
//!     let summary = engine.run(&mut participant, std::path::Path::new(".")).await?;
//!     if let Some(path) = &summary.log_path {
//!         println!("{} trials logged to {}", summary.trials, path.display());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "SRTT Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logfile;
pub mod participant;
pub mod time;

/// A prelude module for easy importing of the most common SRTT types.
pub mod prelude {
    pub use crate::common::{Location, ResponseCode, SequenceId};
    pub use crate::components::builder::SequenceBuilder;
    pub use crate::components::matcher::find_successor;
    pub use crate::components::pair::{validate, PairPolicy, SequencePair};
    pub use crate::components::selector::{
        EmissionRecord, Schedule, Stimulus, TaskState, TrialSelector,
    };
    pub use crate::components::sequence::CyclicSequence;
    pub use crate::components::window::ContextWindow;
    pub use crate::config::SrttConfig;
    pub use crate::engine::{SessionSummary, SrttEngine};
    pub use crate::error::SrttError;
    pub use crate::events::SessionEvent;
    pub use crate::logfile::EmissionLog;
    pub use crate::participant::{Participant, SimulatedParticipant};
    pub use crate::time::{Clock, ManualClock, MonotonicClock};
}
