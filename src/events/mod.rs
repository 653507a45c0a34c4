//! Container events: types, bounded history, listeners, and the fleet bus.
//!
//! This module groups the event **data model** and the delivery machinery a
//! container uses to record and republish everything its connection emits.
//!
//! ## Contents
//! - [`EventKind`], [`ContainerEvent`] — event classification and captured payload
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`, the fleet-wide
//!   "all events" stream a registry exposes for observability
//! - `EventHistory` (crate-private) — fixed-capacity FIFO audit buffer
//! - `ListenerSet` (crate-private) — per-kind callback registry with
//!   panic isolation
//!
//! ## Quick reference
//! - **Publishers**: each container actor, after wrapping an inbound
//!   connection event or synthesizing an `Error`-kind record.
//! - **Consumers**: per-kind listeners registered via
//!   [`Container::subscribe`](crate::Container::subscribe), and any number of
//!   [`Bus`] receivers obtained from
//!   [`ContainerRegistry::subscribe`](crate::ContainerRegistry::subscribe).

mod bus;
mod event;
mod history;
mod listeners;

pub use bus::Bus;
pub use event::{ContainerEvent, EventKind};

pub(crate) use history::EventHistory;
pub(crate) use listeners::{Listener, ListenerSet};
