//! # Fleet event bus for broadcasting container events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from many containers to any number of
//! observers. It is the registry's "all events" stream: every event any
//! container records is also republished here.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls
//!   `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all
//!   receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip the
//!   `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at
//!   send time. The durable audit trail is each container's own history.

use tokio::sync::broadcast;

use super::event::ContainerEvent;

/// Broadcast channel for fleet-wide container events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); every container
/// actor in a registry holds a clone and publishes into the same ring.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<ContainerEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1, clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<ContainerEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers the event is dropped; the call still
    /// returns immediately.
    pub fn publish(&self, event: ContainerEvent) {
        let _ = self.tx.send(event);
    }

    /// Creates a new receiver that will observe subsequent events.
    ///
    /// Each call creates an independent receiver; a receiver only gets
    /// events sent after it subscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ContainerEvent> {
        self.tx.subscribe()
    }
}
