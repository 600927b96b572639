//! Counter target device.

use crate::target::{Frame, TargetPort, WaitFlags};
use crate::{fmt, DeviceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use twi_bus::{Bus, Level};

/// Address byte whose owner stretches the clock around the ACK bit.
const CLOCK_STRETCH_ADDRESS: u8 = 0xA6;

/// A generic target serving auto-incrementing data.
///
/// The first octet of a controller read is `address << 4` (truncated)
/// and each subsequent octet increments; there is no limit to how much
/// may be read. Octets written by the controller are acknowledged,
/// logged and discarded.
///
/// The target whose address byte is `0xA6` additionally stretches the
/// clock before and after the acknowledgement bit on both paths, as a
/// real device might to reserve processing time.
///
/// # Lifecycle
///
/// [`run`](Self::run) is the main loop and must be called from a
/// dedicated thread; [`stop`](Self::stop) asks it to return. Stopping
/// is cooperative — the flag is checked while the bus is idle, so a
/// peer wanting to stop a mid-transaction target must first complete or
/// recover the transaction.
#[derive(Debug)]
pub struct CounterTarget {
    port: TargetPort,
    running: AtomicBool,
}

impl CounterTarget {
    /// Attaches a counter target named `name` with the given 7-bit
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
            port: TargetPort::attach(name, address, bus)?,
            running: AtomicBool::new(false),
        })
    }

    /// Returns the 7-bit bus address.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.port.address()
    }

    /// Asks the main loop to return.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs the main loop: poll SDA for a falling edge, then service
    /// the transaction.
    ///
    /// # Errors
    ///
    /// Propagates [`DeviceError`] from the bus.
    pub fn run(&self) -> Result<(), DeviceError> {
        self.running.store(true, Ordering::SeqCst);

        loop {
            while self.port.sda()? == Level::High {
                if !self.running.load(Ordering::SeqCst) {
                    return Ok(());
                }
            }

            // Falling edge SDA ▔\▁
            self.isr()?;
        }
    }

    /// Services one falling edge of SDA.
    ///
    /// SDA falling while SCL is low is a data change, not a start
    /// condition, and is ignored.
    fn isr(&self) -> Result<(), DeviceError> {
        if self.port.scl()? == Level::Low {
            return Ok(());
        }

        // SCL ▔\▁
        while self.port.scl()? == Level::High {}

        debug!("START");

        let octet = match self.port.read_frame()? {
            Frame::Octet(octet) => octet,
            Frame::Stop | Frame::Start => return Ok(()),
        };

        debug!(address = %fmt::octet(octet), "rx address");

        if !self.port.address_match(octet) {
            self.port.wait_for_condition(WaitFlags::empty())?;
            return Ok(());
        }

        self.port.ack()?;

        if TargetPort::read_operation(octet) {
            self.serve_read()
        } else {
            self.serve_write()
        }
    }

    fn stretches_clock(&self) -> bool {
        self.port.address() << 1 == CLOCK_STRETCH_ADDRESS
    }

    /// Writes data in response to a controller read operation.
    fn serve_read(&self) -> Result<(), DeviceError> {
        let mut data = self.port.address() << 4;

        loop {
            info!(octet = %fmt::octet(data), "tx");
            self.port.write_octet(data)?;

            // SCL ▁/▔
            while self.port.scl()? == Level::Low {}

            if self.stretches_clock() {
                // Stretch *before* sampling SDA, reserving time to
                // prepare the next octet.
                debug!("tx clock stretch");
                self.port.set_scl(Level::Low)?;
            }

            let nack = self.port.sda()?;

            if self.stretches_clock() {
                self.port.set_scl(Level::Low)?;
                self.port.set_scl(Level::Low)?;
                self.port.set_scl(Level::Low)?;
                debug!("tx clock stretch end");
                self.port.set_scl(Level::High)?;
            }

            // SCL ▔\▁
            while self.port.scl()? == Level::High {}

            debug!(nack = (nack == Level::High), "nack");

            if nack == Level::High {
                self.port.wait_for_condition(WaitFlags::START)?;
                return Ok(());
            }

            data = data.wrapping_add(1);
        }
    }

    /// Reads data in response to a controller write operation. The data
    /// is logged and discarded.
    fn serve_write(&self) -> Result<(), DeviceError> {
        loop {
            let octet = match self.port.read_frame()? {
                Frame::Octet(octet) => octet,
                Frame::Stop | Frame::Start => return Ok(()),
            };

            if self.stretches_clock() {
                // Stretch *before* driving the ACK: SDA must be valid
                // before the controller sees SCL go high.
                debug!("rx clock stretch");
                self.port.set_scl(Level::Low)?;
            }

            // Drive SDA low to acknowledge.
            self.port.set_sda(Level::Low)?;

            if self.stretches_clock() {
                self.port.set_scl(Level::Low)?;
                self.port.set_scl(Level::Low)?;
                self.port.set_scl(Level::Low)?;
                debug!("rx clock stretch end");
                self.port.set_scl(Level::High)?;
            }

            // Wait for the controller to sample SDA.
            self.port.wait_for_clock_pulse()?;

            // Release SDA.
            self.port.set_sda(Level::High)?;

            info!(octet = %fmt::octet(octet), "rx");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_served_octet_is_seeded_from_the_address() {
        let bus = Arc::new(Bus::new());
        let target = CounterTarget::attach("T52", 0x52, bus).unwrap();

        assert_eq!(target.address(), 0x52);
        assert_eq!(target.port.address() << 4, 0x20);
    }

    #[test]
    fn only_the_stretch_address_stretches() {
        let bus = Arc::new(Bus::new());

        let plain = CounterTarget::attach("T50", 0x50, Arc::clone(&bus)).unwrap();
        assert!(!plain.stretches_clock());

        let stretchy = CounterTarget::attach("T53", 0x53, bus).unwrap();
        assert!(stretchy.stretches_clock());
    }

    #[test]
    fn stop_ends_the_run_loop() {
        let bus = Arc::new(Bus::new());
        let target = CounterTarget::attach("T50", 0x50, bus).unwrap();

        // run() raises the flag itself, so keep lowering it until the
        // loop has seen it and returned.
        std::thread::scope(|s| {
            let handle = s.spawn(|| target.run());
            while !handle.is_finished() {
                target.stop();
                std::thread::yield_now();
            }
            handle.join().expect("target thread").unwrap();
        });
    }
}
