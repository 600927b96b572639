//! Bus kernel errors.
//!
//! The kernel never fails in normal operation. Every variant here is a
//! programmer error — a handle used on the wrong side of its
//! attach/detach lifecycle — and is surfaced rather than retried.
//! Conditions such as a stuck line or a non-acknowledging target are not
//! kernel errors: they are observable line states that participants
//! interpret at the protocol layer.

use crate::NodeId;
use thiserror::Error;

/// Bus kernel error.
///
/// | Variant | When |
/// |---------|------|
/// | [`AlreadyAttached`](Self::AlreadyAttached) | duplicate attach of the same handle |
/// | [`NotAttached`](Self::NotAttached) | detach, sample or publish with an unknown handle |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The handle is already present in the client table.
    #[error("node already attached: {0}")]
    AlreadyAttached(NodeId),

    /// The handle is not present in the client table.
    #[error("node not attached: {0}")]
    NotAttached(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_node() {
        let id = NodeId::new();

        let err = BusError::AlreadyAttached(id);
        assert!(err.to_string().contains("already attached"));
        assert!(err.to_string().contains(&id.to_string()));

        let err = BusError::NotAttached(id);
        assert!(err.to_string().contains("not attached"));
    }
}
