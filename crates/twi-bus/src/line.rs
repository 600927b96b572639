//! Wired-AND line state.
//!
//! An I²C line is open-drain: participants either pull it low or release
//! it, and a pull-up keeps it high while nobody pulls. [`Line`] models
//! this as the set of drivers currently pulling low — the line is
//! [`Low`](Level::Low) iff that set is non-empty.

use crate::NodeId;
use std::collections::HashSet;

/// Electrical level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Pulled low by at least one driver.
    Low,
    /// Released; held high by the pull-up.
    High,
}

/// Wired-AND state of one bus line.
///
/// A freshly constructed line is [`High`](Level::High). Driving
/// [`Low`](Level::Low) inserts the driver into the low-set; driving
/// [`High`](Level::High) removes it. Both directions are idempotent.
///
/// `Line` is **not** internally synchronised: the bus kernel holds its
/// mutex whenever a line is read or written.
///
/// # Example
///
/// ```
/// use twi_bus::{Level, Line, NodeId};
///
/// let mut line = Line::new();
/// let a = NodeId::new();
/// let b = NodeId::new();
///
/// assert_eq!(line.get(), Level::High);
///
/// line.set(a, Level::Low);
/// line.set(b, Level::Low);
/// line.set(a, Level::High);
///
/// // Still low: b has not released.
/// assert_eq!(line.get(), Level::Low);
///
/// line.set(b, Level::High);
/// assert_eq!(line.get(), Level::High);
/// ```
#[derive(Debug, Default)]
pub struct Line {
    /// Drivers currently pulling the line low.
    low: HashSet<NodeId>,
}

impl Line {
    /// Creates a released (high) line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the aggregate level.
    ///
    /// If *any* driver pulls the line low it is low.
    #[must_use]
    pub fn get(&self) -> Level {
        if self.low.is_empty() {
            Level::High
        } else {
            Level::Low
        }
    }

    /// Drives the line on behalf of `driver`.
    pub fn set(&mut self, driver: NodeId, level: Level) {
        match level {
            Level::Low => {
                self.low.insert(driver);
            }
            Level::High => {
                self.low.remove(&driver);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_high() {
        let line = Line::new();
        assert_eq!(line.get(), Level::High);
    }

    #[test]
    fn wired_and() {
        let mut line = Line::new();
        let a = NodeId::new();
        let b = NodeId::new();

        line.set(a, Level::Low);
        assert_eq!(line.get(), Level::Low);

        line.set(b, Level::Low);
        assert_eq!(line.get(), Level::Low);

        line.set(a, Level::High);
        assert_eq!(line.get(), Level::Low);

        line.set(b, Level::High);
        assert_eq!(line.get(), Level::High);
    }

    #[test]
    fn drive_is_idempotent() {
        let mut line = Line::new();
        let a = NodeId::new();

        line.set(a, Level::Low);
        line.set(a, Level::Low);
        line.set(a, Level::High);

        assert_eq!(line.get(), Level::High);
    }

    #[test]
    fn release_without_drive_is_a_no_op() {
        let mut line = Line::new();
        let a = NodeId::new();

        line.set(a, Level::High);
        assert_eq!(line.get(), Level::High);
    }

    #[test]
    fn low_then_high_restores_prior_state() {
        let mut line = Line::new();
        let a = NodeId::new();
        let b = NodeId::new();

        line.set(b, Level::Low);

        line.set(a, Level::Low);
        line.set(a, Level::High);

        // Unchanged from before a's round trip.
        assert_eq!(line.get(), Level::Low);
    }
}
