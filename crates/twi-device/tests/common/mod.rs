#![allow(dead_code)]
//! Shared harness for bus transaction tests.
//!
//! Each test gets its own bus with four [`CounterTarget`]s at addresses
//! `0x50..0x53` (named `T50..T53`), each on a dedicated thread, plus a
//! controller `C00` driven from the test thread. Dropping the fixture
//! stops and joins the target threads — which requires the bus to be
//! idle, so every test must end its last transaction with a stop
//! condition (or recovery).

use std::sync::Arc;
use std::thread::JoinHandle;
use twi_bus::Bus;
use twi_device::devices::CounterTarget;
use twi_device::{fmt, Controller};

/// Number of targets on the test bus.
pub const N_TARGETS: u8 = 4;

/// First target address; the rest follow consecutively.
pub const BASE_ADDRESS: u8 = 0x50;

/// Test bus with running targets.
pub struct BusFixture {
    targets: Vec<Arc<CounterTarget>>,
    threads: Vec<JoinHandle<()>>,
}

impl BusFixture {
    /// Starts the bus, the target threads and the controller.
    pub fn start() -> (Self, Controller) {
        let bus = Arc::new(Bus::new());

        let mut targets = Vec::new();
        let mut threads = Vec::new();

        for i in 0..N_TARGETS {
            let address = BASE_ADDRESS + i;
            let name = format!("T{}", fmt::octet(address));

            let target = Arc::new(
                CounterTarget::attach(name, address, Arc::clone(&bus)).expect("attach target"),
            );

            let runner = Arc::clone(&target);
            threads.push(std::thread::spawn(move || {
                runner.run().expect("target run loop");
            }));

            targets.push(target);
        }

        let controller = Controller::attach("C00", bus).expect("attach controller");

        (
            Self { targets, threads },
            controller,
        )
    }
}

impl Drop for BusFixture {
    fn drop(&mut self) {
        for target in &self.targets {
            target.stop();
        }
        for thread in self.threads.drain(..) {
            thread.join().expect("target thread");
        }
    }
}

/// The address octet for a write operation.
pub fn write_address(address: u8) -> u8 {
    address << 1
}

/// The address octet for a read operation.
pub fn read_address(address: u8) -> u8 {
    (address << 1) | 0x01
}
