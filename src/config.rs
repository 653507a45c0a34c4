//! # Global container configuration.
//!
//! Provides [`ContainerConfig`] centralized settings shared by every
//! container a registry creates.
//!
//! Config is used in two ways:
//! 1. **Registry creation**: `ContainerRegistry::new(config)`
//! 2. **Per-container wiring**: each spawned container actor receives a clone
//!
//! ## Field semantics
//! - `heartbeat_interval`: watchdog tick period; a connection is considered
//!   stale after `2 × heartbeat_interval` without inbound activity
//! - `max_history`: event history ring size (min 1; clamped by the history)
//! - `reconnect`: backoff schedule and attempt budget for automatic recovery
//! - `bus_capacity`: fleet event bus ring buffer size (min 1; clamped by Bus)
//! - `command_capacity`: per-container command queue depth

use std::time::Duration;

use crate::policies::ReconnectPolicy;

/// Global configuration for container supervision.
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    /// Heartbeat watchdog tick period.
    ///
    /// The watchdog never talks to the connection; it judges liveness from
    /// the timestamp of the most recently observed inbound activity. Health
    /// drops once `2 × heartbeat_interval` passes without activity.
    pub heartbeat_interval: Duration,

    /// Maximum number of events retained per container (FIFO eviction).
    pub max_history: usize,

    /// Backoff schedule and attempt budget for automatic reconnection.
    pub reconnect: ReconnectPolicy,

    /// Capacity of the fleet event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Depth of each container's inbound command queue.
    pub command_capacity: usize,
}

impl ContainerConfig {
    /// Returns the staleness threshold: `2 × heartbeat_interval`.
    #[inline]
    pub fn stale_after(&self) -> Duration {
        self.heartbeat_interval * 2
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a command queue depth clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }
}

impl Default for ContainerConfig {
    /// Default configuration:
    ///
    /// - `heartbeat_interval = 30s` (stale after 60s of silence)
    /// - `max_history = 100`
    /// - `reconnect = ReconnectPolicy::default()` (5s first, ×2, cap 300s, 10 attempts)
    /// - `bus_capacity = 1024`
    /// - `command_capacity = 64`
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            max_history: 100,
            reconnect: ReconnectPolicy::default(),
            bus_capacity: 1024,
            command_capacity: 64,
        }
    }
}
