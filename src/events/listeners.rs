//! # Per-kind listener registry with panic isolation.
//!
//! `ListenerSet` maps each [`EventKind`] to an ordered list of callbacks.
//! Delivery is synchronous, in insertion order, on the owning container's
//! task. A panicking listener is caught and logged; it never prevents
//! delivery to the remaining listeners or destabilizes the container.
//!
//! ## Rules
//! - Listener ordering is insertion order; no priority.
//! - Removal is idempotent: removing an unknown id is a no-op.
//! - `catch_unwind` isolates each call; shared state a listener holds across
//!   a panic may be left inconsistent (`AssertUnwindSafe`).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use crate::events::{ContainerEvent, EventKind};

/// Callback invoked for each matching event, on the container's own task.
pub(crate) type Listener = Box<dyn Fn(&ContainerEvent) + Send + 'static>;

/// Ordered, kind-keyed callback registry.
pub(crate) struct ListenerSet {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(u64, Listener)>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            by_kind: HashMap::new(),
        }
    }

    /// Registers a listener for `kind`; returns its id for removal.
    pub(crate) fn insert(&mut self, kind: EventKind, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_kind.entry(kind).or_default().push((id, listener));
        id
    }

    /// Removes the listener with the given id. Idempotent.
    pub(crate) fn remove(&mut self, kind: EventKind, id: u64) {
        if let Some(list) = self.by_kind.get_mut(&kind) {
            list.retain(|(entry_id, _)| *entry_id != id);
        }
    }

    /// Delivers `event` to every listener registered for its kind.
    ///
    /// Each call is wrapped in `catch_unwind`; a panic is logged and
    /// delivery continues with the next listener.
    pub(crate) fn deliver(&self, event: &ContainerEvent) {
        let Some(list) = self.by_kind.get(&event.kind()) else {
            return;
        };
        for (id, listener) in list {
            let call = AssertUnwindSafe(|| listener(event));
            if std::panic::catch_unwind(call).is_err() {
                tracing::warn!(
                    container = %event.container,
                    kind = event.kind().as_label(),
                    listener = *id,
                    "listener panicked; continuing with remaining listeners"
                );
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }
}
