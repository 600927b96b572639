//! Bus synchronisation kernel for the twi-sim I²C simulator.
//!
//! This crate provides the rendezvous object at the centre of the
//! simulator: a two-wire open-drain bus shared by participant threads.
//! Participants interact only by driving and sampling the two lines;
//! the kernel reproduces wired-AND electrical behaviour and enforces a
//! deterministic interleaving of participant actions, so bit-level
//! protocol behaviour — start/stop conditions, acknowledgement bits,
//! clock stretching, contention, recovery — is observable and
//! reproducible.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   sample / drive / delay    ┌──────────────────────┐
//! │ controller │ ──────────────────────────► │         Bus          │
//! │   thread   │ ◄────────────────────────── │                      │
//! └────────────┘    blocks until every       │  ┌─────┐  ┌─────┐    │
//! ┌────────────┐    peer has observed and    │  │ SDA │  │ SCL │    │
//! │   target   │    reacted (two barrier     │  └─────┘  └─────┘    │
//! │  threads   │    passes per event)        │  queue · epoch ·     │
//! └────────────┘                             │  client progress     │
//!                                            └──────────────────────┘
//! ```
//!
//! | Type | Role |
//! |------|------|
//! | [`Line`] / [`Level`] | wired-AND state of one signal |
//! | [`NodeId`] | opaque participant identity |
//! | [`Event`] | atomic mutation request |
//! | [`Bus`] | event queue, epoch counter, two-phase barrier |
//! | [`Node`] | per-participant facade: sample, drive, delay |
//! | [`BusError`] | programmer-error surfacing |
//!
//! # Polling, not notification
//!
//! Participants poll the lines. The barrier guarantees that two samples
//! happen between events, so a loop of the form
//! `while node.sda()? == Level::High {}` observes a published change
//! within a bounded number of wake-ups. Replacing polling with
//! notification would change the observable bus semantics.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use twi_bus::{Bus, Level, Node};
//!
//! let bus = Arc::new(Bus::new());
//! let controller = Node::attach("C00", Arc::clone(&bus))?;
//!
//! // A start condition: SDA falls while SCL stays high.
//! controller.set_sda(Level::Low)?;
//! controller.delay()?;
//! controller.set_scl(Level::Low)?;
//! # Ok::<(), twi_bus::BusError>(())
//! ```

mod bus;
mod error;
mod event;
mod id;
mod line;
mod node;

pub use bus::Bus;
pub use error::BusError;
pub use event::Event;
pub use id::NodeId;
pub use line::{Level, Line};
pub use node::Node;
