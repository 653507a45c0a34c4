//! # External connection contract consumed by the supervisor.
//!
//! A [`Connection`] is the opaque, protocol-level network session a container
//! manages. This crate never implements one: it only starts it, stops it, and
//! subscribes to its typed event stream. Authentication, message framing, and
//! the wire protocol all live behind this trait.
//!
//! ## Event model
//! The connection reports everything through one closed event type,
//! [`ConnectionEvent`], covering five kinds: connection updates, message
//! upserts, credential updates, presence updates, and errors. Payload shapes
//! that are protocol-specific stay opaque (`serde_json::Value`).
//!
//! ## Contract notes
//! - `start()` / `stop()` may block on the connection's own I/O. No timeout
//!   is enforced here; callers should treat both as bounded, cancelable
//!   operations.
//! - A failed `start()` during automatic reconnection is **not** retried by
//!   the supervisor on its own. Implementations should surface failed opens
//!   as a subsequent [`ConnectionPhase::Close`] update; a connection that
//!   fails silently leaves its container parked at reduced health until an
//!   explicit stop/start.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ConnectionError;
use crate::events::EventKind;

/// Shared handle to an external connection (`Arc<dyn Connection>`).
pub type ConnectionRef = Arc<dyn Connection>;

/// # Long-lived stateful network session, managed but not implemented here.
///
/// Implementations wrap the actual protocol client. The supervisor calls
/// [`start`](Connection::start) and [`stop`](Connection::stop) and consumes
/// the stream returned by [`subscribe`](Connection::subscribe).
///
/// ## Rules
/// - `subscribe()` may be called before `start()`; receivers only observe
///   events sent after subscription.
/// - Every failed open (including reconnect attempts initiated by the
///   supervisor) should eventually surface as a `Close` update so that
///   recovery stays event-driven.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Opens the underlying session.
    async fn start(&self) -> Result<(), ConnectionError>;

    /// Closes the underlying session.
    async fn stop(&self) -> Result<(), ConnectionError>;

    /// Creates a new receiver observing subsequent connection events.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;
}

/// Phase reported by a connection update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// Session established and usable.
    Open,
    /// Session lost or torn down.
    Close,
    /// Session negotiation in progress.
    Connecting,
}

/// Connection lifecycle update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    /// Current phase of the session.
    pub phase: ConnectionPhase,
    /// Reason for the most recent disconnect, when the protocol exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_disconnect_reason: Option<String>,
}

/// Inbound message batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageUpsert {
    /// Protocol-specific message payloads.
    pub messages: Vec<serde_json::Value>,
    /// Upsert classification as reported by the protocol (e.g. "notify").
    pub update_type: String,
}

/// Credential material rotated by the protocol client.
///
/// The blob is opaque; durable persistence of credentials is the
/// connection's own concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredsUpdate {
    /// Opaque credential blob.
    pub creds: serde_json::Value,
}

/// Presence change for some subject the session observes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Identifier of the subject whose presence changed.
    pub subject_id: String,
    /// Protocol-specific presence payload.
    #[serde(default)]
    pub presences: serde_json::Value,
}

/// Error reported by the connection outside of a start/stop call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Human-readable failure description.
    pub message: String,
    /// Optional protocol-level error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// # Typed event emitted by a connection.
///
/// Closed tagged union over the five event kinds a container observes.
/// Containers wrap each of these into a
/// [`ContainerEvent`](crate::ContainerEvent) with a capture timestamp before
/// recording and republishing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// Session phase change (open / close / connecting).
    ConnectionUpdate(ConnectionUpdate),
    /// Inbound message batch.
    MessageUpsert(MessageUpsert),
    /// Credential rotation.
    CredsUpdate(CredsUpdate),
    /// Presence change.
    PresenceUpdate(PresenceUpdate),
    /// Connection-reported error.
    Error(ErrorNotice),
}

impl ConnectionEvent {
    /// Returns the kind tag for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectionEvent::ConnectionUpdate(_) => EventKind::ConnectionUpdate,
            ConnectionEvent::MessageUpsert(_) => EventKind::MessageUpsert,
            ConnectionEvent::CredsUpdate(_) => EventKind::CredsUpdate,
            ConnectionEvent::PresenceUpdate(_) => EventKind::PresenceUpdate,
            ConnectionEvent::Error(_) => EventKind::Error,
        }
    }

    /// Shorthand for an `Open` connection update.
    pub fn open() -> Self {
        ConnectionEvent::ConnectionUpdate(ConnectionUpdate {
            phase: ConnectionPhase::Open,
            last_disconnect_reason: None,
        })
    }

    /// Shorthand for a `Close` connection update with an optional reason.
    pub fn close(reason: Option<String>) -> Self {
        ConnectionEvent::ConnectionUpdate(ConnectionUpdate {
            phase: ConnectionPhase::Close,
            last_disconnect_reason: reason,
        })
    }

    /// Shorthand for a `Connecting` connection update.
    pub fn connecting() -> Self {
        ConnectionEvent::ConnectionUpdate(ConnectionUpdate {
            phase: ConnectionPhase::Connecting,
            last_disconnect_reason: None,
        })
    }
}
