//! Participant identity.

use uuid::Uuid;

/// Identity of a participant attached to a [`Bus`](crate::Bus).
///
/// A `NodeId` is used in two places:
///
/// - as the driver key in a [`Line`](crate::Line)'s low-set
/// - as the client key in the kernel's progress table
///
/// Each attached participant owns exactly one `NodeId`, generated at
/// attach time.
///
/// # Example
///
/// ```
/// use twi_bus::NodeId;
///
/// let a = NodeId::new();
/// let b = NodeId::new();
///
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

#[allow(clippy::new_without_default)] // Default intentionally not implemented - see below
impl NodeId {
    /// Creates a new `NodeId` with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

// NOTE: NodeId intentionally does NOT implement Default.
// Default::default() would generate an id that is not attached to any bus;
// every id in circulation should come from an attach path.

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}
