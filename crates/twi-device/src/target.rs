//! Target-side protocol primitives.
//!
//! [`TargetPort`] decodes line events back into octets and conditions.
//! The controller owns the clock, so everything here is phrased as
//! "wait for SCL, then look at SDA": octets are sampled on rising
//! edges, and start/stop conditions are recognised as SDA changing
//! while SCL stays high.

use crate::{fmt, DeviceError};
use bitflags::bitflags;
use std::sync::Arc;
use tracing::debug;
use twi_bus::{Bus, Level, Node};

bitflags! {
    /// Options for [`TargetPort::wait_for_condition`].
    ///
    /// A stop condition is always awaited; set [`START`](Self::START) to
    /// also return on a (re)start condition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaitFlags: u8 {
        /// Also wait for a start condition.
        const START = 1 << 0;
    }
}

/// Outcome of reading one frame from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Eight data bits, MSB first.
    Octet(u8),
    /// A stop condition interrupted the frame.
    Stop,
    /// A (re)start condition interrupted the frame.
    Start,
}

/// Condition returned by [`TargetPort::wait_for_condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Stop condition: SDA rose while SCL was high.
    Stop,
    /// Start condition: SDA fell while SCL was high.
    Start,
}

/// An I²C target's connection to the bus.
///
/// Holds the node and the target's 7-bit address, and provides the
/// protocol primitives a target state machine is built from: frame
/// reads, acknowledgement, octet writes and condition waits. Device
/// implementations such as
/// [`CounterTarget`](crate::devices::CounterTarget) drive their main
/// loop through this type.
#[derive(Debug)]
pub struct TargetPort {
    node: Node,
    /// Bus address (7-bit).
    address: u8,
}

impl TargetPort {
    /// Attaches a target port named `name` with the given 7-bit
    /// `address`.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the attach.
    pub fn attach(
        name: impl Into<String>,
        address: u8,
        bus: Arc<Bus>,
    ) -> Result<Self, DeviceError> {
        Ok(Self {
            node: Node::attach(name, bus)?,
            address,
        })
    }

    /// Returns the target name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Returns the 7-bit bus address.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Returns true if the address portion of an address octet matches.
    #[must_use]
    pub fn address_match(&self, octet: u8) -> bool {
        octet >> 1 == self.address
    }

    /// Returns true if the R/W' bit of an address octet indicates a
    /// read operation.
    #[must_use]
    pub fn read_operation(octet: u8) -> bool {
        octet & 0x01 != 0
    }

    /// Reads one frame: eight bits sampled on SCL rising edges.
    ///
    /// While SCL stays high after a sample, SDA is watched for a level
    /// change: the bit going high means stop, going low means restart.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn read_frame(&self) -> Result<Frame, DeviceError> {
        debug!("read");

        let mut octet = 0u8;

        for _ in 0..8 {
            // SCL ▁/▔
            while self.scl()? == Level::Low {}

            let level = self.sda()?;

            octet <<= 1;
            if level == Level::High {
                octet |= 1;
            }

            while self.scl()? == Level::High {
                if level == Level::Low && self.sda()? == Level::High {
                    // SCL ▁/▔▔▔
                    // SDA ▁▁▁/▔
                    debug!("read=STOP");
                    return Ok(Frame::Stop);
                } else if level == Level::High && self.sda()? == Level::Low {
                    // SCL ▁/▔▔▔
                    // SDA ▔▔▔\▁
                    debug!("read=START");
                    return Ok(Frame::Start);
                }
            }
        }

        debug!(octet = %fmt::octet(octet), "read");
        Ok(Frame::Octet(octet))
    }

    /// Acknowledges an octet written by the controller.
    ///
    /// Drives SDA low, waits for the controller to sample it (one clock
    /// pulse), then releases SDA.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn ack(&self) -> Result<(), DeviceError> {
        self.set_sda(Level::Low)?;
        self.wait_for_clock_pulse()?;
        self.set_sda(Level::High)?;
        Ok(())
    }

    /// Writes one octet, MSB first, pacing each bit on the controller's
    /// clock pulses. SDA is released after the last bit.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn write_octet(&self, octet: u8) -> Result<(), DeviceError> {
        debug!(octet = %fmt::octet(octet), "write");

        let mut bits = octet;
        for _ in 0..8 {
            let level = if bits & 0x80 != 0 {
                Level::High
            } else {
                Level::Low
            };
            self.set_sda(level)?;
            bits <<= 1;

            self.wait_for_clock_pulse()?;
        }

        self.set_sda(Level::High)?;

        debug!("written");
        Ok(())
    }

    /// Waits for one full SCL pulse ▁/▔\▁.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn wait_for_clock_pulse(&self) -> Result<(), DeviceError> {
        while self.scl()? == Level::Low {}

        while self.scl()? == Level::High {}

        Ok(())
    }

    /// Waits for a stop condition, or also a start condition when
    /// [`WaitFlags::START`] is set.
    ///
    /// SDA only changes while SCL is high for start and stop
    /// conditions, so the loop keeps the last SDA level seen before
    /// each rising edge and compares it against SDA during the high
    /// phase.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn wait_for_condition(&self, flags: WaitFlags) -> Result<Condition, DeviceError> {
        debug!("wait_for_condition");

        loop {
            let mut level = self.sda()?;

            while self.scl()? == Level::Low {
                level = self.sda()?;
            }

            while self.scl()? == Level::High {
                if level == Level::Low && self.sda()? == Level::High {
                    // SCL ▁/▔▔▔
                    // SDA ▁▁▁/▔
                    debug!("wait_for_condition=STOP");
                    return Ok(Condition::Stop);
                } else if flags.contains(WaitFlags::START)
                    && level == Level::High
                    && self.sda()? == Level::Low
                {
                    // SCL ▁/▔▔▔
                    // SDA ▔▔▔\▁
                    debug!("wait_for_condition=START");
                    return Ok(Condition::Start);
                }
            }
        }
    }

    /// Samples the data line.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn sda(&self) -> Result<Level, DeviceError> {
        Ok(self.node.sda()?)
    }

    /// Drives the data line.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn set_sda(&self, level: Level) -> Result<(), DeviceError> {
        Ok(self.node.set_sda(level)?)
    }

    /// Samples the clock line.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn scl(&self) -> Result<Level, DeviceError> {
        Ok(self.node.scl()?)
    }

    /// Drives the clock line.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn set_scl(&self, level: Level) -> Result<(), DeviceError> {
        Ok(self.node.set_scl(level)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(address: u8) -> TargetPort {
        let bus = Arc::new(Bus::new());
        TargetPort::attach("T", address, bus).unwrap()
    }

    #[test]
    fn address_match_ignores_the_rw_bit() {
        let port = port(0x50);

        assert!(port.address_match(0xA0)); // 0x50 write
        assert!(port.address_match(0xA1)); // 0x50 read
        assert!(!port.address_match(0xA2)); // 0x51 write
    }

    #[test]
    fn read_operation_is_bit_zero() {
        assert!(TargetPort::read_operation(0xA1));
        assert!(!TargetPort::read_operation(0xA0));
        assert!(TargetPort::read_operation(0x01));
    }

    #[test]
    fn wait_flags_default_to_stop_only() {
        let flags = WaitFlags::empty();
        assert!(!flags.contains(WaitFlags::START));

        let flags = WaitFlags::START;
        assert!(flags.contains(WaitFlags::START));
    }
}
