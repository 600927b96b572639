//! Controller and target devices for the twi-sim I²C simulator.
//!
//! This crate layers octet-level protocol engines on top of the
//! [`twi_bus`] kernel's line primitives:
//!
//! | Type | Role |
//! |------|------|
//! | [`Controller`] | clock owner: start/stop conditions, octet read/write, bus recovery |
//! | [`TargetPort`] | target-side primitives: frame reads, ACK, condition waits |
//! | [`devices::CounterTarget`] | demo target with a `run()`/`stop()` main loop |
//!
//! Octet operations carry [`bitflags`]-style options mirroring what a
//! firmware driver would expose: a write can open with a (re)start and
//! close with a stop, a read can NACK its last octet.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use twi_bus::Bus;
//! use twi_device::devices::CounterTarget;
//! use twi_device::{Controller, ReadFlags, WriteFlags};
//!
//! # fn main() -> Result<(), twi_device::DeviceError> {
//! let bus = Arc::new(Bus::new());
//! let target = Arc::new(CounterTarget::attach("T50", 0x50, Arc::clone(&bus))?);
//!
//! let runner = Arc::clone(&target);
//! let thread = std::thread::spawn(move || runner.run());
//!
//! let mut controller = Controller::attach("C00", bus)?;
//! let nack = controller.write((0x50 << 1) | 1, WriteFlags::START)?;
//! assert!(!nack);
//! let octet = controller.read(ReadFlags::NACK | ReadFlags::STOP)?;
//! assert_eq!(octet, 0x00);
//!
//! target.stop();
//! thread.join().expect("target thread")?;
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through [`tracing`]: protocol steps at `debug`, octet
//! payloads at `info`, octets rendered as two-character uppercase hex
//! via [`fmt::octet`].

mod controller;
pub mod devices;
mod error;
pub mod fmt;
mod target;

pub use controller::{Controller, ReadFlags, WriteFlags};
pub use error::DeviceError;
pub use target::{Condition, Frame, TargetPort, WaitFlags};
