//! Bus synchronisation kernel.
//!
//! [`Bus`] is the rendezvous object shared by every participant thread.
//! It owns the two wired-AND lines, serialises mutations into atomic
//! events, and holds each publishing thread blocked until every other
//! participant has observed the new state *twice* — once to see it,
//! once to react to it. That barrier discipline is what turns a
//! free-running set of threads into a cycle-accurate bit-banged bus.
//!
//! # Publish protocol
//!
//! ```text
//!  set(p, event)
//!    │
//!    ├─ enqueue (p, event)
//!    │
//!    ├─ another publisher active? ──► mark p pending, wait on the
//!    │        ▲                       pending condition; every wake
//!    │        │                       runs advance-if-behind so the
//!    │        │                       active publisher's barrier can
//!    │        └───────────────────────complete (drained on behalf →
//!    │                                return early)
//!    ├─ claim publisher role
//!    ├─ drain the whole queue onto the lines
//!    │
//!    ├─ twice:                          ┌─ other participants, in get():
//!    │    sequence += 1                 │    if behind, advance by one
//!    │    own sequence := sequence      │    and signal the sync
//!    │    broadcast pending condition   │    condition
//!    │    wait until all clients ───────┘
//!    │    have caught up
//!    │
//!    └─ release role, broadcast pending condition
//! ```
//!
//! The first barrier pass guarantees every other participant has
//! *observed* the new line state; the second guarantees each has had the
//! opportunity to *react* and enqueue its own event behind this one.
//!
//! # Locking
//!
//! One mutex protects the entire kernel state; the two condition
//! variables share it. Lines and facades have no locks of their own, so
//! `get` returns a coherent snapshot of both lines by construction.

use crate::{BusError, Event, Level, Line, NodeId};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;

/// Per-client synchronisation progress.
#[derive(Debug, Default)]
struct ClientState {
    /// Last barrier epoch this client has acknowledged.
    sequence: u64,

    /// True while the client is blocked in [`Bus::set`] waiting for its
    /// event to be published.
    pending: bool,
}

/// An event waiting in the publication queue.
#[derive(Debug)]
struct Transaction {
    node: NodeId,
    event: Event,
}

/// Kernel state behind the single mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Data line.
    sda: Line,

    /// Clock line.
    scl: Line,

    /// Epoch counter, incremented twice per barrier round.
    sequence: u64,

    /// Progress table for attached participants.
    clients: HashMap<NodeId, ClientState>,

    /// The in-flight event publisher, at most one at a time.
    publisher: Option<NodeId>,

    /// Events awaiting publication, in insertion order.
    queue: Vec<Transaction>,
}

impl Inner {
    fn client_mut(&mut self, node: NodeId) -> Result<&mut ClientState, BusError> {
        self.clients
            .get_mut(&node)
            .ok_or(BusError::NotAttached(node))
    }

    /// Applies one queued event to the lines. `Delay` touches neither.
    fn process(&mut self, transaction: &Transaction) {
        match transaction.event {
            Event::DataLow => self.sda.set(transaction.node, Level::Low),
            Event::DataHigh => self.sda.set(transaction.node, Level::High),
            Event::ClockLow => self.scl.set(transaction.node, Level::Low),
            Event::ClockHigh => self.scl.set(transaction.node, Level::High),
            Event::Delay => {}
        }
    }

    /// Closes the one-epoch gap between this client and the kernel.
    ///
    /// Invariant: `sequence - client.sequence` is 0 or 1, so a single
    /// increment is always enough. The waiting publisher is signalled
    /// through `sync_condition`.
    fn advance_if_behind(
        &mut self,
        node: NodeId,
        sync_condition: &Condvar,
    ) -> Result<(), BusError> {
        let sequence = self.sequence;
        let client = self.client_mut(node)?;
        if client.sequence < sequence {
            client.sequence += 1;
            sync_condition.notify_one();
        }
        Ok(())
    }

    fn all_synchronized(&self) -> bool {
        self.clients
            .values()
            .all(|client| client.sequence == self.sequence)
    }
}

/// The shared two-wire bus.
///
/// Participants interact with the bus only through a [`NodeId`] obtained
/// at [`attach`](Bus::attach) time, usually via the [`Node`](crate::Node)
/// facade. All four operations are thread-safe.
///
/// # Example
///
/// ```
/// use twi_bus::{Bus, Event, Level, NodeId};
///
/// let bus = Bus::new();
/// let node = NodeId::new();
///
/// bus.attach(node)?;
/// bus.set(node, Event::DataLow)?;
///
/// let (sda, scl) = bus.get(node)?;
/// assert_eq!(sda, Level::Low);
/// assert_eq!(scl, Level::High);
///
/// bus.detach(node)?;
/// # Ok::<(), twi_bus::BusError>(())
/// ```
#[derive(Debug, Default)]
pub struct Bus {
    inner: Mutex<Inner>,

    /// Signalled when a client advances its sequence; awaited by the
    /// active publisher.
    sync_condition: Condvar,

    /// Broadcast when the publisher role is released, when queued events
    /// are drained on a client's behalf, and on every epoch increment;
    /// awaited by would-be publishers.
    pending_condition: Condvar,
}

impl Bus {
    /// Creates a bus with both lines released and no participants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a participant.
    ///
    /// The new client starts synchronised with the current epoch, so a
    /// participant attached mid-traffic cannot stall an in-flight
    /// barrier.
    ///
    /// # Errors
    ///
    /// [`BusError::AlreadyAttached`] if `node` is already attached.
    pub fn attach(&self, node: NodeId) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        if inner.clients.contains_key(&node) {
            return Err(BusError::AlreadyAttached(node));
        }
        let sequence = inner.sequence;
        inner.clients.insert(
            node,
            ClientState {
                sequence,
                pending: false,
            },
        );
        Ok(())
    }

    /// Detaches a participant.
    ///
    /// Any low-drives the participant still holds are released, and a
    /// publisher blocked on the departed client's progress is woken to
    /// re-evaluate its barrier.
    ///
    /// # Errors
    ///
    /// [`BusError::NotAttached`] if `node` is not attached.
    pub fn detach(&self, node: NodeId) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        if inner.clients.remove(&node).is_none() {
            return Err(BusError::NotAttached(node));
        }
        inner.sda.set(node, Level::High);
        inner.scl.set(node, Level::High);
        self.sync_condition.notify_all();
        Ok(())
    }

    /// Samples both lines, registering observation progress for `node`.
    ///
    /// Yields the scheduler before taking the kernel mutex so that a
    /// tight busy-poll on a line level interleaves with other
    /// participants' progress.
    ///
    /// # Errors
    ///
    /// [`BusError::NotAttached`] if `node` is not attached.
    pub fn get(&self, node: NodeId) -> Result<(Level, Level), BusError> {
        std::thread::yield_now();

        let mut inner = self.inner.lock();
        inner.advance_if_behind(node, &self.sync_condition)?;
        Ok((inner.sda.get(), inner.scl.get()))
    }

    /// Publishes an event and blocks until it is fully synchronised.
    ///
    /// On return, every other attached participant has sampled the bus
    /// at least twice since the event was applied: once to observe the
    /// new state and once to react to it.
    ///
    /// If another thread already holds the publisher role, this call
    /// waits; the active publisher drains the whole queue, so the event
    /// may be published on this thread's behalf. There is no fairness
    /// guarantee between starved would-be publishers — whichever thread
    /// wins the mutex after a release claims the role.
    ///
    /// # Errors
    ///
    /// [`BusError::NotAttached`] if `node` is not attached.
    pub fn set(&self, node: NodeId, event: Event) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        inner.client_mut(node)?;
        inner.queue.push(Transaction { node, event });

        if inner.publisher.is_some() {
            // Another thread is busy publishing. This happens when two
            // threads race to publish, and when this thread publishes in
            // response to an event currently being published.
            inner.client_mut(node)?.pending = true;

            // Once publishing is possible, the first blocked publisher
            // to gain the lock handles *all* queued requests; that keeps
            // every client thread in sync.
            while inner.publisher.is_some() {
                loop {
                    if !inner.client_mut(node)?.pending {
                        break;
                    }

                    // Still pending: register progress for the in-flight
                    // transaction, or its barrier never completes.
                    inner.advance_if_behind(node, &self.sync_condition)?;

                    if inner.publisher.is_none() {
                        break;
                    }
                    self.pending_condition.wait(&mut inner);
                }

                if !inner.client_mut(node)?.pending {
                    // Published on our behalf. Nothing more to do.
                    return Ok(());
                }
            }

            if inner.queue.is_empty() {
                // Queue emptied by another thread. Nothing more to do.
                return Ok(());
            }
        }

        // Transaction begins.
        inner.publisher = Some(node);

        let snapshot = std::mem::take(&mut inner.queue);
        for transaction in &snapshot {
            inner.process(transaction);

            if let Some(client) = inner.clients.get_mut(&transaction.node) {
                client.pending = false;
            }
        }

        // Wait for the other threads to synchronize *twice*. After the
        // first pass they have *observed* the new state by calling get();
        // after the second they have *acted* on it and called get() again.
        for _ in 0..2 {
            inner.sequence += 1;

            // This thread is blocked here and cannot advance itself.
            let sequence = inner.sequence;
            if let Some(client) = inner.clients.get_mut(&node) {
                client.sequence = sequence;
            }

            // Pending publishers implicitly see the new state.
            self.pending_condition.notify_all();

            while !inner.all_synchronized() {
                self.sync_condition.wait(&mut inner);
            }
        }

        // Transaction complete.
        inner.publisher = None;
        self.pending_condition.notify_all();
        Ok(())
    }
}
