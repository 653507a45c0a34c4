//! # connvisor
//!
//! **Connvisor** is a supervision runtime for long-lived stateful network
//! connections.
//!
//! It keeps one externally-maintained connection per bot identity alive,
//! observes its health, recovers it after failure with exponential backoff,
//! and fans its events out to interested observers without letting any one
//! observer destabilize the others. The protocol client itself is an external
//! collaborator behind the [`Connection`] trait: connvisor only starts it,
//! stops it, and listens.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Connection  │   │  Connection  │   │  Connection  │
//!     │ (external #1)│   │ (external #2)│   │ (external #3)│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Container   │   │  Container   │   │  Container   │
//!     │ (actor task) │   │ (actor task) │   │ (actor task) │
//!     │ - lifecycle  │   │              │   │              │
//!     │ - heartbeat  │   │              │   │              │
//!     │ - history    │   │              │   │              │
//!     │ - listeners  │   │              │   │              │
//!     │ - reconnect  │   │              │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ publishes        │                  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │            fleet-wide "all events" stream, bounded ring           │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ContainerRegistry                                                │
//! │  - identity → Container ownership map (the only shared state)     │
//! │  - idempotent create / lookup / remove                            │
//! │  - health_report(): { identity → StatusSnapshot }                 │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Container lifecycle
//! ```text
//! Initializing ──start()──► Running ──stop()──► Stopping ──► Stopped
//!      ▲                       │                                │
//!      └────── failed start ───┘◄──────────── start() ──────────┘
//!
//! While Running:
//!   open       ──► healthy, attempts = 0, watchdog armed
//!   close      ──► unhealthy, watchdog disarmed,
//!                  attempts += 1 (within budget) ──► reconnect timer
//!   timer due  ──► Connection::start() again (same subscriptions;
//!                  a failed reattempt waits for the next close)
//!   stale      ──► watchdog flips healthy → false; state unchanged
//! ```
//!
//! Transient disconnects never leave `Running`: health drops, state stays.
//! Only an explicit `stop()` or a failed cold start moves a container toward
//! `Stopped`.
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                     |
//! |-------------------|-------------------------------------------------------------------|----------------------------------------|
//! | **Supervision**   | Per-identity lifecycle, activity watchdog, automatic recovery.    | [`Container`], [`ContainerState`]      |
//! | **Fleet**         | Ownership map, enumeration, aggregate health reporting.           | [`ContainerRegistry`], [`StatusSnapshot`] |
//! | **Events**        | Typed event capture, bounded FIFO history, per-kind listeners.    | [`ContainerEvent`], [`EventKind`]      |
//! | **Policies**      | Exponential backoff schedule with an attempt budget.              | [`ReconnectPolicy`]                    |
//! | **Contract**      | The external session the supervisor consumes.                     | [`Connection`], [`ConnectionEvent`]    |
//! | **Errors**        | Typed lifecycle and connection errors.                            | [`ContainerError`], [`ConnectionError`] |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use connvisor::{
//!     Connection, ConnectionError, ConnectionEvent, ContainerConfig, ContainerIdentity,
//!     ContainerRegistry, EventKind,
//! };
//! use async_trait::async_trait;
//! use tokio::sync::broadcast;
//!
//! struct MyConnection {
//!     events: broadcast::Sender<ConnectionEvent>,
//! }
//!
//! #[async_trait]
//! impl Connection for MyConnection {
//!     async fn start(&self) -> Result<(), ConnectionError> {
//!         // open the protocol session; report phases via the event stream
//!         Ok(())
//!     }
//!     async fn stop(&self) -> Result<(), ConnectionError> {
//!         Ok(())
//!     }
//!     fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
//!         self.events.subscribe()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ContainerRegistry::new(ContainerConfig::default());
//!
//!     let (events, _) = broadcast::channel(256);
//!     let connection = Arc::new(MyConnection { events });
//!
//!     let container = registry
//!         .create(ContainerIdentity::new("acme", "support-bot"), connection)
//!         .await;
//!     container.start().await?;
//!
//!     container
//!         .subscribe(EventKind::MessageUpsert, |event| {
//!             println!("[{}] message batch", event.container);
//!         })
//!         .await?;
//!
//!     for (identity, status) in registry.health_report().await {
//!         println!("{identity}: {}", status.derived_status());
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod core;
mod error;
mod events;
mod policies;

// ---- Public re-exports ----

pub use config::ContainerConfig;
pub use connection::{
    Connection, ConnectionEvent, ConnectionPhase, ConnectionRef, ConnectionUpdate, CredsUpdate,
    ErrorNotice, MessageUpsert, PresenceUpdate,
};
pub use core::{
    BotStatus, Container, ContainerIdentity, ContainerRegistry, ContainerState, StatusSnapshot,
    SubscriptionHandle,
};
pub use error::{ConnectionError, ContainerError};
pub use events::{Bus, ContainerEvent, EventKind};
pub use policies::ReconnectPolicy;
