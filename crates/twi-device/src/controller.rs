//! Octet-level bus controller.
//!
//! [`Controller`] turns octet operations into line events: it generates
//! start, restart and stop conditions, clocks octets out and in bit by
//! bit, and handles the acknowledgement bit after each octet. Targets
//! may stretch the clock at any point; the controller waits for SCL to
//! actually read high before treating a clock period as begun.

use crate::{fmt, DeviceError};
use bitflags::bitflags;
use std::sync::Arc;
use tracing::debug;
use twi_bus::{Bus, Level, Node};

bitflags! {
    /// Options for [`Controller::write`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WriteFlags: u8 {
        /// Send a start (or restart) condition first.
        const START = 1 << 0;
        /// Send a stop condition after the acknowledgement bit.
        const STOP = 1 << 1;
    }
}

bitflags! {
    /// Options for [`Controller::read`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReadFlags: u8 {
        /// Do not acknowledge the read octet.
        const NACK = 1 << 0;
        /// Send a stop condition after the acknowledgement bit.
        const STOP = 1 << 1;
    }
}

/// An I²C controller attached to a shared bus.
///
/// # Example
///
/// A controller alone on the bus sees every read bit float high:
///
/// ```
/// use std::sync::Arc;
/// use twi_bus::Bus;
/// use twi_device::{Controller, ReadFlags, WriteFlags};
///
/// let bus = Arc::new(Bus::new());
/// let mut controller = Controller::attach("C00", bus)?;
///
/// let nack = controller.write(0xA0, WriteFlags::START)?;
/// assert!(nack); // nobody home
///
/// let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP)?;
/// assert_eq!(octet, 0xFF);
/// # Ok::<(), twi_device::DeviceError>(())
/// ```
#[derive(Debug)]
pub struct Controller {
    node: Node,
    started: bool,
}

impl Controller {
    /// Attaches a controller named `name` to `bus`.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the attach.
    pub fn attach(name: impl Into<String>, bus: Arc<Bus>) -> Result<Self, DeviceError> {
        Ok(Self {
            node: Node::attach(name, bus)?,
            started: false,
        })
    }

    /// Returns the controller name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Writes an octet, MSB first, and samples the acknowledgement bit.
    ///
    /// Returns `true` if the octet was **not** acknowledged.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn write(&mut self, octet: u8, flags: WriteFlags) -> Result<bool, DeviceError> {
        debug!(octet = %fmt::octet(octet), "write octet");

        if flags.contains(WriteFlags::START) {
            self.write_start_condition()?;
        }

        let mut bits = octet;
        for _ in 0..8 {
            let level = if bits & 0x80 != 0 {
                Level::High
            } else {
                Level::Low
            };
            self.write_bit(level)?;
            bits <<= 1;
        }

        let nack = self.read_bit()? == Level::High;
        debug!(nack, "nack");

        if flags.contains(WriteFlags::STOP) {
            self.write_stop_condition()?;
        }

        debug!("written");
        Ok(nack)
    }

    /// Reads an octet, MSB first, then writes the acknowledgement bit.
    ///
    /// The octet is acknowledged unless [`ReadFlags::NACK`] is set.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn read(&mut self, flags: ReadFlags) -> Result<u8, DeviceError> {
        debug!("read");

        let mut octet = 0u8;
        for _ in 0..8 {
            octet <<= 1;
            if self.read_bit()? == Level::High {
                octet |= 1;
            }
        }

        // Default to acknowledge.
        let nack = if flags.contains(ReadFlags::NACK) {
            Level::High
        } else {
            Level::Low
        };

        debug!(nack = (nack == Level::High), "ack bit");
        self.write_bit(nack)?;

        if flags.contains(ReadFlags::STOP) {
            self.write_stop_condition()?;
        }

        debug!(octet = %fmt::octet(octet), "read");
        Ok(octet)
    }

    /// Recovers a bus whose SDA is stuck low after an interrupted
    /// transaction.
    ///
    /// Pulses SCL until SDA samples high nine consecutive times, then
    /// sends a stop condition.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn recover(&mut self) -> Result<(), DeviceError> {
        debug!("recover");

        self.node.set_scl(Level::Low)?;
        self.node.delay()?;

        const NUM_SAMPLES: u32 = 9;

        let mut counter = 0;
        loop {
            let level = self.read_bit()?;

            if level == Level::High {
                counter += 1;
                if counter == NUM_SAMPLES {
                    self.write_stop_condition()?;
                    break;
                }
            } else {
                counter = 0;
            }

            debug!(counter, "recover");
        }

        debug!("recovered");
        Ok(())
    }

    /// Waits while a target holds SCL low.
    fn clock_stretching(&self) -> Result<(), DeviceError> {
        while self.node.scl()? == Level::Low {
            // TODO: add a deadline parameter to Bus::get so a dead
            // target cannot pin this loop forever
            debug!("clock stretched");
        }
        Ok(())
    }

    /// Writes a start condition: SDA pulled low while SCL stays high.
    fn write_start_condition(&mut self) -> Result<(), DeviceError> {
        if self.started {
            debug!("restart");

            self.node.set_sda(Level::High)?;
            self.node.delay()?;
            self.node.set_scl(Level::High)?;
            self.clock_stretching()?;
            self.node.delay()?;
        }

        debug!("start");

        self.node.set_sda(Level::Low)?;
        self.node.delay()?;
        self.node.set_scl(Level::Low)?;
        self.started = true;

        debug!("started");
        Ok(())
    }

    /// Writes a stop condition: SCL goes high, then SDA goes high.
    fn write_stop_condition(&mut self) -> Result<(), DeviceError> {
        debug!("stop");

        self.node.set_sda(Level::Low)?;
        self.node.delay()?;
        self.node.set_scl(Level::High)?;
        self.clock_stretching()?;
        self.node.delay()?;
        self.node.set_sda(Level::High)?;
        self.node.delay()?;
        self.started = false;

        debug!("stopped");
        Ok(())
    }

    /// Drives SDA, then pulses SCL. Other nodes sample SDA while SCL is
    /// high.
    fn write_bit(&mut self, bit: Level) -> Result<(), DeviceError> {
        debug!(high = (bit == Level::High), "write bit");

        self.node.set_sda(bit)?;
        self.node.delay()?;
        self.node.set_scl(Level::High)?;
        self.node.delay()?;
        self.clock_stretching()?;
        self.node.set_scl(Level::Low)?;

        debug!("written");
        Ok(())
    }

    /// Pulses SCL, sampling SDA while SCL is high.
    fn read_bit(&mut self) -> Result<Level, DeviceError> {
        debug!("read bit");

        self.node.set_sda(Level::High)?;
        self.node.delay()?;
        self.node.set_scl(Level::High)?;
        self.clock_stretching()?;
        self.node.delay()?;
        let bit = self.node.sda()?;
        self.node.set_scl(Level::Low)?;

        debug!(high = (bit == Level::High), "read bit");
        Ok(bit)
    }
}
