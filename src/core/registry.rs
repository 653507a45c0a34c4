//! # Container registry - fleet ownership and health aggregation.
//!
//! The registry owns the mapping from [`ContainerIdentity`] to [`Container`].
//! It creates containers (idempotently), looks them up, enumerates them,
//! tears them down, and aggregates per-container status into a fleet health
//! report. It holds **no** connection-level logic: every read is a snapshot,
//! never a reach into another container's private state.
//!
//! ## Architecture
//! ```text
//! ContainerRegistry
//!   ├─ containers: RwLock<HashMap<identity, Container>>   (only shared state)
//!   ├─ bus: Bus            ──► subscribe(): fleet-wide "all events" stream
//!   └─ runtime_token       ──► child token per container actor
//!
//! create(id, conn) ──► Container::spawn (one actor task per identity)
//! remove(id)       ──► container.stop() ──► cancel actor ──► drop entry
//! health_report()  ──► { id → StatusSnapshot } (pure watch reads)
//! ```
//!
//! ## Rules
//! - Exactly one container per live identity: `create` returns the existing
//!   container when the identity is already materialized.
//! - Creation/removal take the coarse map lock; they are infrequent relative
//!   to event volume, which never touches the map.
//! - `remove` stops first; a stop failure is propagated but the container is
//!   reaped regardless.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::ContainerConfig;
use crate::connection::ConnectionRef;
use crate::core::container::Container;
use crate::core::health::StatusSnapshot;
use crate::core::identity::ContainerIdentity;
use crate::error::ContainerError;
use crate::events::{Bus, ContainerEvent};

/// Fleet-level ownership map plus aggregation.
pub struct ContainerRegistry {
    containers: RwLock<HashMap<ContainerIdentity, Container>>,
    bus: Bus,
    cfg: ContainerConfig,
    runtime_token: CancellationToken,
}

impl ContainerRegistry {
    /// Creates an empty registry with the given configuration.
    ///
    /// Construct once per owning process and pass by reference; there is no
    /// ambient global instance.
    pub fn new(cfg: ContainerConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            containers: RwLock::new(HashMap::new()),
            bus,
            cfg,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Creates a new receiver on the fleet-wide "all events" stream.
    ///
    /// Every event any container records is republished here; receivers that
    /// lag behind the bus capacity observe `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<ContainerEvent> {
        self.bus.subscribe()
    }

    /// Materializes a container for `identity`, idempotently.
    ///
    /// If the identity is already live, the existing container is returned
    /// and `connection` is dropped unused. The new container starts in
    /// `Initializing`; the caller decides when to `start()` it.
    pub async fn create(
        &self,
        identity: ContainerIdentity,
        connection: ConnectionRef,
    ) -> Container {
        let mut containers = self.containers.write().await;
        if let Some(existing) = containers.get(&identity) {
            return existing.clone();
        }

        let container = Container::spawn(
            identity.clone(),
            connection,
            self.cfg.clone(),
            self.bus.clone(),
            &self.runtime_token,
        );
        containers.insert(identity.clone(), container.clone());
        tracing::debug!(container = %identity, "container created");
        container
    }

    /// Looks up a live container by identity.
    pub async fn get(&self, identity: &ContainerIdentity) -> Option<Container> {
        self.containers.read().await.get(identity).cloned()
    }

    /// Returns the sorted list of live identities.
    pub async fn list(&self) -> Vec<ContainerIdentity> {
        let containers = self.containers.read().await;
        let mut identities: Vec<ContainerIdentity> = containers.keys().cloned().collect();
        identities.sort_unstable();
        identities
    }

    /// Number of live containers.
    pub async fn len(&self) -> usize {
        self.containers.read().await.len()
    }

    /// Returns true if no container is live.
    pub async fn is_empty(&self) -> bool {
        self.containers.read().await.is_empty()
    }

    /// Stops and removes the container for `identity`.
    ///
    /// Returns `Ok(false)` when the identity was not live. A stop failure is
    /// propagated, but the container is torn down and reaped regardless:
    /// a stuck connection is reported, not kept.
    pub async fn remove(&self, identity: &ContainerIdentity) -> Result<bool, ContainerError> {
        let Some(container) = self.containers.write().await.remove(identity) else {
            return Ok(false);
        };

        let res = container.stop().await;
        container.cancel_actor();
        tracing::debug!(container = %identity, "container removed");
        res.map(|_| true)
    }

    /// Aggregates every live container's status into a fleet health report.
    pub async fn health_report(&self) -> HashMap<ContainerIdentity, StatusSnapshot> {
        let containers = self.containers.read().await;
        containers
            .iter()
            .map(|(identity, container)| (identity.clone(), container.status()))
            .collect()
    }

    /// Stops and reaps every container, then cancels the runtime token.
    ///
    /// Stops run concurrently; failures are logged, not propagated, since at
    /// shutdown there is nobody left to retry.
    pub async fn shutdown(&self) {
        let drained: Vec<(ContainerIdentity, Container)> = {
            let mut containers = self.containers.write().await;
            containers.drain().collect()
        };

        let stops = drained
            .iter()
            .map(|(identity, container)| async move { (identity, container.stop().await) });
        for (identity, res) in futures::future::join_all(stops).await {
            if let Err(err) = res {
                tracing::warn!(container = %identity, error = %err, "stop failed during shutdown");
            }
        }

        for (_, container) in &drained {
            container.cancel_actor();
        }
        self.runtime_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionEvent;
    use crate::core::health::ContainerState;
    use crate::core::testing::{MockConnection, drain};
    use crate::events::EventKind;

    fn identity(bot: &str) -> ContainerIdentity {
        ContainerIdentity::new("acme", bot)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_is_idempotent() {
        let registry = ContainerRegistry::new(ContainerConfig::default());
        let conn = MockConnection::arc();

        let first = registry.create(identity("support-bot"), conn.clone()).await;
        first.start().await.unwrap();

        let second = registry.create(identity("support-bot"), MockConnection::arc()).await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            second.status().container_state,
            ContainerState::Running,
            "same underlying container, not a fresh one"
        );
        assert_eq!(conn.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_stops_and_reaps() {
        let registry = ContainerRegistry::new(ContainerConfig::default());
        let conn = MockConnection::arc();

        let container = registry.create(identity("support-bot"), conn.clone()).await;
        container.start().await.unwrap();
        conn.emit(ConnectionEvent::open());
        drain().await;

        assert!(registry.remove(&identity("support-bot")).await.unwrap());
        assert_eq!(conn.stop_count(), 1);
        assert!(registry.get(&identity("support-bot")).await.is_none());
        assert!(registry.is_empty().await);

        // The actor is gone; stale handles observe termination.
        drain().await;
        let err = container.start().await.unwrap_err();
        assert_eq!(err.as_label(), "container_terminated");

        // Removing an absent identity is a no-op.
        assert!(!registry.remove(&identity("support-bot")).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_is_sorted() {
        let registry = ContainerRegistry::new(ContainerConfig::default());
        for bot in ["zulu", "alpha", "mike"] {
            registry.create(identity(bot), MockConnection::arc()).await;
        }
        let listed = registry.list().await;
        let bots: Vec<&str> = listed.iter().map(|id| id.bot()).collect();
        assert_eq!(bots, vec!["alpha", "mike", "zulu"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_report_aggregates_snapshots() {
        let registry = ContainerRegistry::new(ContainerConfig::default());
        let conn_a = MockConnection::arc();
        let conn_b = MockConnection::arc();

        let a = registry.create(identity("alpha"), conn_a.clone()).await;
        registry.create(identity("beta"), conn_b).await;
        a.start().await.unwrap();
        conn_a.emit(ConnectionEvent::open());
        drain().await;

        let report = registry.health_report().await;
        assert_eq!(report.len(), 2);

        let alpha = &report[&identity("alpha")];
        assert_eq!(alpha.container_state, ContainerState::Running);
        assert!(alpha.is_healthy);
        assert_eq!(alpha.container_id, "acme:alpha");

        let beta = &report[&identity("beta")];
        assert_eq!(beta.container_state, ContainerState::Initializing);
        assert!(!beta.is_healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bus_carries_fleet_events() {
        let registry = ContainerRegistry::new(ContainerConfig::default());
        let mut stream = registry.subscribe();
        let conn = MockConnection::arc();

        let container = registry.create(identity("support-bot"), conn.clone()).await;
        container.start().await.unwrap();
        conn.emit(ConnectionEvent::open());
        drain().await;

        let event = stream.recv().await.unwrap();
        assert_eq!(&*event.container, "acme:support-bot");
        assert_eq!(event.kind(), EventKind::ConnectionUpdate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let registry = ContainerRegistry::new(ContainerConfig::default());
        let conn_a = MockConnection::arc();
        let conn_b = MockConnection::arc();

        let a = registry.create(identity("alpha"), conn_a.clone()).await;
        let b = registry.create(identity("beta"), conn_b.clone()).await;
        a.start().await.unwrap();
        b.start().await.unwrap();

        registry.shutdown().await;
        assert_eq!(conn_a.stop_count(), 1);
        assert_eq!(conn_b.stop_count(), 1);
        assert!(registry.is_empty().await);
    }
}
