//! # Lifecycle states, health record, and the status snapshot.
//!
//! [`ContainerState`] is the container lifecycle state machine's vocabulary.
//! `HealthRecord` is the actor-private mutable record behind it; liveness
//! math uses the tokio monotonic clock while the wall-clock twins of those
//! instants are what snapshots report. [`StatusSnapshot`] is the immutable,
//! serializable view published to observers after every mutation.
//!
//! ## Rules
//! - Health is derived, never authoritative: a container is healthy only
//!   while `Running` with a fresh heartbeat.
//! - Transient disconnects drop health but never change state; only `stop()`
//!   or a failed `start()` move state toward `Stopped`.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Container lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Created, never started.
    Initializing,
    /// Started; stays `Running` across transient disconnects.
    Running,
    /// `stop()` in progress.
    Stopping,
    /// Stopped by `stop()` or by a failed `start()`.
    Stopped,
}

impl ContainerState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ContainerState::Initializing => "initializing",
            ContainerState::Running => "running",
            ContainerState::Stopping => "stopping",
            ContainerState::Stopped => "stopped",
        }
    }

    /// Whether `start()` is admissible from this state.
    #[inline]
    pub fn can_start(&self) -> bool {
        matches!(self, ContainerState::Initializing | ContainerState::Stopped)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Actor-private mutable health record.
///
/// `last_activity` is the monotonic twin of `last_heartbeat`: staleness math
/// must not jump with wall-clock adjustments, while reports need real
/// timestamps.
#[derive(Debug, Clone)]
pub(crate) struct HealthRecord {
    /// Derived liveness flag; recomputed on watchdog ticks and transitions.
    pub is_healthy: bool,
    /// Wall-clock time of the most recent inbound activity.
    pub last_heartbeat: DateTime<Utc>,
    /// Monotonic time of the most recent inbound activity.
    pub last_activity: Instant,
    /// Closes counted since the last successful open.
    pub connection_attempts: u32,
    /// Wall-clock time of the most recent credential rotation.
    pub creds_last_updated: DateTime<Utc>,
}

impl HealthRecord {
    pub(crate) fn new() -> Self {
        Self {
            is_healthy: false,
            last_heartbeat: Utc::now(),
            last_activity: Instant::now(),
            connection_attempts: 0,
            creds_last_updated: Utc::now(),
        }
    }

    /// Records inbound activity at the current instant.
    pub(crate) fn touch(&mut self) {
        self.last_heartbeat = Utc::now();
        self.last_activity = Instant::now();
    }

    /// Whether activity was observed within the staleness threshold.
    pub(crate) fn heartbeat_fresh(&self, stale_after: Duration) -> bool {
        self.last_activity.elapsed() <= stale_after
    }
}

/// Coarse bot status derived from state and health.
///
/// In-process convenience for fleet dashboards; not part of the serialized
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotStatus {
    /// Running with a fresh heartbeat.
    Connected,
    /// Running but unhealthy (disconnected, stale, or exhausted).
    Degraded,
    /// Not running.
    Stopped,
}

impl BotStatus {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BotStatus::Connected => "connected",
            BotStatus::Degraded => "degraded",
            BotStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Immutable status view of one container.
///
/// Serializes to the exact field set observability consumers expect:
/// `containerId`, `containerState`, `isHealthy`, `lastHeartbeat`,
/// `connectionAttempts`, `credsLastUpdated`, `eventHistorySize`, with
/// ISO-8601 timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Rendered identity, `"<tenant>:<bot>"`.
    pub container_id: String,
    /// Lifecycle state.
    pub container_state: ContainerState,
    /// Derived liveness flag.
    pub is_healthy: bool,
    /// Wall-clock time of the most recent inbound activity.
    pub last_heartbeat: DateTime<Utc>,
    /// Closes counted since the last successful open.
    pub connection_attempts: u32,
    /// Wall-clock time of the most recent credential rotation.
    pub creds_last_updated: DateTime<Utc>,
    /// Number of events currently retained in the history.
    pub event_history_size: usize,
}

impl StatusSnapshot {
    /// Derives the coarse bot status from state and health.
    pub fn derived_status(&self) -> BotStatus {
        match (self.container_state, self.is_healthy) {
            (ContainerState::Running, true) => BotStatus::Connected,
            (ContainerState::Running, false) => BotStatus::Degraded,
            _ => BotStatus::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: ContainerState, healthy: bool) -> StatusSnapshot {
        StatusSnapshot {
            container_id: "acme:support-bot".into(),
            container_state: state,
            is_healthy: healthy,
            last_heartbeat: Utc::now(),
            connection_attempts: 3,
            creds_last_updated: Utc::now(),
            event_history_size: 42,
        }
    }

    #[test]
    fn test_wire_shape_field_set() {
        let json = serde_json::to_value(snapshot(ContainerState::Running, true)).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "connectionAttempts",
                "containerId",
                "containerState",
                "credsLastUpdated",
                "eventHistorySize",
                "isHealthy",
                "lastHeartbeat",
            ]
        );

        assert_eq!(obj["containerState"], "running");
        assert_eq!(obj["connectionAttempts"], 3);
        // Timestamps serialize as parseable ISO-8601 strings.
        let stamp = obj["lastHeartbeat"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ContainerState::Initializing.as_label(), "initializing");
        assert_eq!(ContainerState::Stopped.as_label(), "stopped");
        assert!(ContainerState::Initializing.can_start());
        assert!(ContainerState::Stopped.can_start());
        assert!(!ContainerState::Running.can_start());
        assert!(!ContainerState::Stopping.can_start());
    }

    #[test]
    fn test_derived_status() {
        assert_eq!(
            snapshot(ContainerState::Running, true).derived_status(),
            BotStatus::Connected
        );
        assert_eq!(
            snapshot(ContainerState::Running, false).derived_status(),
            BotStatus::Degraded
        );
        assert_eq!(
            snapshot(ContainerState::Stopped, false).derived_status(),
            BotStatus::Stopped
        );
        assert_eq!(
            snapshot(ContainerState::Initializing, false).derived_status(),
            BotStatus::Stopped
        );
    }

    #[tokio::test]
    async fn test_heartbeat_freshness() {
        let mut record = HealthRecord::new();
        record.touch();
        assert!(record.heartbeat_fresh(Duration::from_secs(60)));
    }
}
