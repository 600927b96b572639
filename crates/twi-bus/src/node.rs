//! Participant facade.

use crate::{Bus, BusError, Event, Level, NodeId};
use std::sync::Arc;

/// A participant's handle onto a shared [`Bus`].
///
/// Construction attaches a fresh [`NodeId`] to the bus; dropping the
/// node detaches it. The bus holds only the id, never the node, so
/// participant lifetime stays with the caller.
///
/// Controller and target implementations are built on these five
/// primitives: sample a line, drive a line, and delay. After a drive
/// returns, the new state is globally visible and every peer has had two
/// synchronisation windows to act on it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use twi_bus::{Bus, Level, Node};
///
/// let bus = Arc::new(Bus::new());
/// let node = Node::attach("C00", Arc::clone(&bus))?;
///
/// node.set_sda(Level::Low)?;
/// assert_eq!(node.sda()?, Level::Low);
/// # Ok::<(), twi_bus::BusError>(())
/// ```
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    bus: Arc<Bus>,
}

impl Node {
    /// Attaches a new participant named `name` to `bus`.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from [`Bus::attach`].
    pub fn attach(name: impl Into<String>, bus: Arc<Bus>) -> Result<Self, BusError> {
        let id = NodeId::new();
        bus.attach(id)?;
        Ok(Self {
            id,
            name: name.into(),
            bus,
        })
    }

    /// Returns the participant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the participant's bus identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Samples the data line.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from [`Bus::get`].
    pub fn sda(&self) -> Result<Level, BusError> {
        let (sda, _) = self.bus.get(self.id)?;
        Ok(sda)
    }

    /// Drives the data line to `level`.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from [`Bus::set`].
    pub fn set_sda(&self, level: Level) -> Result<(), BusError> {
        self.bus.set(self.id, Event::data(level))
    }

    /// Samples the clock line.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from [`Bus::get`].
    pub fn scl(&self) -> Result<Level, BusError> {
        let (_, scl) = self.bus.get(self.id)?;
        Ok(scl)
    }

    /// Drives the clock line to `level`.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from [`Bus::set`].
    pub fn set_scl(&self, level: Level) -> Result<(), BusError> {
        self.bus.set(self.id, Event::clock(level))
    }

    /// Runs one barrier round without driving a line, letting changes to
    /// SDA and SCL propagate to the other nodes.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from [`Bus::set`].
    pub fn delay(&self) -> Result<(), BusError> {
        self.bus.set(self.id, Event::Delay)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let _ = self.bus.detach(self.id);
    }
}
