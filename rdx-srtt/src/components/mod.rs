//! Contains the building blocks of the sequence engine.
//!
//! Sequences are built (`builder`), checked pairwise (`pair`), queried by
//! context (`matcher`, `window`) and finally driven trial by trial by the
//! `selector` state machine. The `SrttEngine` wires them to a participant, a
//! clock and the emission log.

pub mod builder;
pub mod matcher;
pub mod pair;
pub mod selector;
pub mod sequence;
pub mod window;
