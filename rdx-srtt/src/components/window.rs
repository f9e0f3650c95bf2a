//! The rolling context of the most recently emitted locations.

use crate::common::Location;
use crate::components::sequence::CyclicSequence;

/// A fixed-size window over the last `K` emitted locations, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    items: Vec<Location>,
}

impl ContextWindow {
    /// Creates a window holding `initial`. Its length is the window's order
    /// for the rest of its life.
    pub fn new(initial: Vec<Location>) -> Self {
        Self { items: initial }
    }

    /// Seeds a window with the `order` items of `sequence` starting at the
    /// circular `offset`.
    pub fn seeded(sequence: &CyclicSequence, offset: usize) -> Self {
        Self::new(sequence.window(offset))
    }

    /// Drops the oldest location and appends `value` as the newest.
    pub fn shift_append(&mut self, value: Location) {
        if self.items.is_empty() {
            return;
        }
        self.items.rotate_left(1);
        if let Some(last) = self.items.last_mut() {
            *last = value;
        }
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.items
    }

    pub fn order(&self) -> usize {
        self.items.len()
    }

    /// The newest location in the window.
    pub fn newest(&self) -> Option<Location> {
        self.items.last().copied()
    }
}
