//! Contains common, primitive types shared by every part of the engine.
//!
//! Locations, response codes and sequence identities are all tiny values, but
//! giving each its own type keeps a response code from being logged where a
//! location is expected and vice versa.

use serde::Deserialize;
use std::fmt;

/// A placeholder position on screen, in `[0, L)` for an alphabet of size `L`.
///
/// Placeholders are indexed from left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct Location(pub u8);

impl Location {
    /// The location as a slice index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The discrete answer produced by the input mapper for one key press.
///
/// The engine never checks it against the shown location; it is logged as is
/// so correctness can be analysed offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ResponseCode(pub u8);

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two hidden sequences drives a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceId {
    /// Shown with high probability.
    Regular,
    /// Shown rarely.
    Irregular,
}

impl SequenceId {
    /// The code written to the emission log (`0` regular, `1` irregular).
    pub fn code(self) -> u8 {
        match self {
            SequenceId::Regular => 0,
            SequenceId::Irregular => 1,
        }
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceId::Regular => f.write_str("regular"),
            SequenceId::Irregular => f.write_str("irregular"),
        }
    }
}
