//! # Captured events flowing through a container.
//!
//! The [`EventKind`] enum classifies the five kinds of traffic a connection
//! produces. The [`ContainerEvent`] struct is the immutable record a
//! container captures for each of them: the payload plus a capture timestamp,
//! the owning container's identity, and a monotonic sequence number.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Events from a single connection reach the history, the
//! listeners, and the fleet bus in the order the connection produced them;
//! `seq` additionally restores a total order across containers when fleet
//! logs are merged.
//!
//! ## Example
//! ```rust
//! use connvisor::{ConnectionEvent, ContainerEvent, EventKind};
//!
//! let ev = ContainerEvent::capture("acme:support-bot".into(), ConnectionEvent::open());
//! assert_eq!(ev.kind(), EventKind::ConnectionUpdate);
//! assert_eq!(&*ev.container, "acme:support-bot");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::connection::ConnectionEvent;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of container events.
///
/// Closed set: one tag per payload variant of
/// [`ConnectionEvent`](crate::ConnectionEvent). Used to key listener
/// registrations and to filter histories without touching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Session phase change (open / close / connecting).
    ConnectionUpdate,
    /// Inbound message batch.
    MessageUpsert,
    /// Credential rotation.
    CredsUpdate,
    /// Presence change.
    PresenceUpdate,
    /// Connection-reported or supervisor-contained error.
    Error,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::ConnectionUpdate,
        EventKind::MessageUpsert,
        EventKind::CredsUpdate,
        EventKind::PresenceUpdate,
        EventKind::Error,
    ];

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::ConnectionUpdate => "connection_update",
            EventKind::MessageUpsert => "message_upsert",
            EventKind::CredsUpdate => "creds_update",
            EventKind::PresenceUpdate => "presence_update",
            EventKind::Error => "error",
        }
    }
}

/// Immutable record of one event observed by a container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock capture timestamp.
    pub at: DateTime<Utc>,
    /// Rendered identity of the owning container (`"<tenant>:<bot>"`).
    pub container: Arc<str>,
    /// The captured payload.
    pub payload: ConnectionEvent,
}

impl ContainerEvent {
    /// Captures a payload: stamps it with the current time and the next
    /// global sequence number.
    pub fn capture(container: Arc<str>, payload: ConnectionEvent) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            container,
            payload,
        }
    }

    /// Returns the kind tag of the captured payload.
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
