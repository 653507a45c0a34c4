//! # Bounded FIFO audit buffer of recent container events.
//!
//! `EventHistory` keeps the most recent `capacity` events in insertion order.
//! When full, appending evicts the oldest entry. The buffer is owned by one
//! container actor; outside observers only ever see cloned snapshots.

use std::collections::VecDeque;

use crate::events::ContainerEvent;

/// Insertion-ordered ring of recent events with FIFO eviction.
pub(crate) struct EventHistory {
    buf: VecDeque<ContainerEvent>,
    capacity: usize,
}

impl EventHistory {
    /// Creates an empty history holding at most `capacity` events (min 1).
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an event, evicting the oldest entry when at capacity.
    pub(crate) fn push(&mut self, event: ContainerEvent) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(event);
    }

    /// Number of retained events.
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns the most recent `limit` events (all when `None`) as an
    /// independent clone, oldest first. Mutating the returned vector never
    /// affects the live buffer.
    pub(crate) fn snapshot(&self, limit: Option<usize>) -> Vec<ContainerEvent> {
        match limit {
            None => self.buf.iter().cloned().collect(),
            Some(n) => {
                let skip = self.buf.len().saturating_sub(n);
                self.buf.iter().skip(skip).cloned().collect()
            }
        }
    }
}
