//! # Container: per-identity supervisor handle.
//!
//! A [`Container`] is the clonable façade over one
//! [`ContainerActor`](super::actor::ContainerActor). Lifecycle and history
//! requests travel over an mpsc command channel with oneshot replies; status
//! reads never touch the actor: they read the last [`StatusSnapshot`] the
//! actor published through a `watch` channel.
//!
//! ## Rules
//! - Exactly one actor per container; every clone of the handle talks to it.
//! - `status()` / `is_healthy()` / `credential_age()` are lock-free snapshot
//!   reads, safe to call from any task at any rate.
//! - Once the owning registry tears the actor down, every pending and future
//!   command resolves to [`ContainerError::Terminated`].

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ContainerConfig;
use crate::connection::ConnectionRef;
use crate::core::actor::{Command, ContainerActor};
use crate::core::health::{ContainerState, StatusSnapshot};
use crate::core::identity::ContainerIdentity;
use crate::error::ContainerError;
use crate::events::{Bus, ContainerEvent, EventKind};

/// Handle to one supervised connection container.
#[derive(Clone)]
pub struct Container {
    identity: ContainerIdentity,
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<StatusSnapshot>,
    cancel: CancellationToken,
}

impl Container {
    /// Spawns the actor task for `identity` and returns its handle.
    ///
    /// The actor's cancellation token is a child of `parent`, so registry
    /// teardown propagates without affecting sibling containers.
    pub(crate) fn spawn(
        identity: ContainerIdentity,
        connection: ConnectionRef,
        cfg: ContainerConfig,
        bus: Bus,
        parent: &CancellationToken,
    ) -> Self {
        let label = identity.render();
        let (cmd_tx, cmd_rx) = mpsc::channel(cfg.command_capacity_clamped());
        let (status_tx, status_rx) = watch::channel(StatusSnapshot {
            container_id: label.to_string(),
            container_state: ContainerState::Initializing,
            is_healthy: false,
            last_heartbeat: Utc::now(),
            connection_attempts: 0,
            creds_last_updated: Utc::now(),
            event_history_size: 0,
        });

        let cancel = parent.child_token();
        let actor = ContainerActor::new(label, connection, cfg, bus, cmd_rx, status_tx);
        tokio::spawn(actor.run(cancel.clone()));

        Self {
            identity,
            cmd_tx,
            status_rx,
            cancel,
        }
    }

    /// Identity this container supervises.
    pub fn identity(&self) -> &ContainerIdentity {
        &self.identity
    }

    /// Opens the connection and enters `Running`.
    ///
    /// Admissible from `Initializing` or `Stopped`. A failed open finalizes
    /// at `Stopped` and surfaces as [`ContainerError::Start`]; cold-start
    /// retry policy belongs to the caller.
    pub async fn start(&self) -> Result<(), ContainerError> {
        self.lifecycle(|reply| Command::Start { reply }).await
    }

    /// Stops the connection, best-effort, always finalizing at `Stopped`.
    ///
    /// Idempotent. A failed connection stop surfaces as
    /// [`ContainerError::Stop`] but the container still ends `Stopped`.
    pub async fn stop(&self) -> Result<(), ContainerError> {
        self.lifecycle(|reply| Command::Stop { reply }).await
    }

    /// Returns the most recently published status snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.status_rx.borrow().clone()
    }

    /// Derived liveness: true only while `Running` with a fresh heartbeat.
    pub fn is_healthy(&self) -> bool {
        self.status_rx.borrow().is_healthy
    }

    /// Age of the most recent credential rotation.
    pub fn credential_age(&self) -> Duration {
        let age = Utc::now() - self.status_rx.borrow().creds_last_updated;
        age.to_std().unwrap_or_default()
    }

    /// Returns the most recent `limit` recorded events (all when `None`),
    /// oldest first, as an independent snapshot.
    pub async fn event_history(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<ContainerEvent>, ContainerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::History { limit, reply: tx })
            .await
            .map_err(|_| ContainerError::Terminated)?;
        rx.await.map_err(|_| ContainerError::Terminated)
    }

    /// Registers a listener for one event kind.
    ///
    /// The listener runs synchronously on the container's own task, in
    /// insertion order relative to other listeners of the same kind. A
    /// panicking listener is isolated: logged, skipped, and never allowed
    /// to affect other listeners or the container itself.
    pub async fn subscribe(
        &self,
        kind: EventKind,
        listener: impl Fn(&ContainerEvent) + Send + 'static,
    ) -> Result<SubscriptionHandle, ContainerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                kind,
                listener: Box::new(listener),
                reply: tx,
            })
            .await
            .map_err(|_| ContainerError::Terminated)?;
        let id = rx.await.map_err(|_| ContainerError::Terminated)?;
        Ok(SubscriptionHandle {
            kind,
            id,
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Terminates the actor task. Registry teardown path.
    pub(crate) fn cancel_actor(&self) {
        self.cancel.cancel();
    }

    async fn lifecycle(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), ContainerError>>) -> Command,
    ) -> Result<(), ContainerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| ContainerError::Terminated)?;
        rx.await.map_err(|_| ContainerError::Terminated)?
    }
}

/// Handle returned by [`Container::subscribe`]; removes the listener.
pub struct SubscriptionHandle {
    kind: EventKind,
    id: u64,
    cmd_tx: mpsc::Sender<Command>,
}

impl SubscriptionHandle {
    /// Kind this subscription was registered for.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes the listener. Idempotent: repeated calls are no-ops, as is
    /// unsubscribing from an already-terminated container.
    pub async fn unsubscribe(&self) {
        let _ = self
            .cmd_tx
            .send(Command::Unsubscribe {
                kind: self.kind,
                id: self.id,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionEvent;
    use crate::core::testing::{MockConnection, drain};
    use crate::policies::ReconnectPolicy;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    fn spawn(conn: Arc<MockConnection>, cfg: ContainerConfig) -> Container {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        Container::spawn(
            ContainerIdentity::new("acme", "support-bot"),
            conn,
            cfg,
            bus,
            &token,
        )
    }

    async fn spawn_started(conn: Arc<MockConnection>, cfg: ContainerConfig) -> Container {
        let container = spawn(conn.clone(), cfg);
        container.start().await.unwrap();
        conn.emit(ConnectionEvent::open());
        drain().await;
        container
    }

    fn upsert_tag(ev: &ContainerEvent) -> Option<usize> {
        match &ev.payload {
            ConnectionEvent::MessageUpsert(u) => u.update_type.parse().ok(),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_open_becomes_healthy() {
        let conn = MockConnection::arc();
        let container = spawn(conn.clone(), ContainerConfig::default());

        let status = container.status();
        assert_eq!(status.container_state, ContainerState::Initializing);
        assert!(!status.is_healthy);
        assert_eq!(status.container_id, "acme:support-bot");

        container.start().await.unwrap();
        assert_eq!(conn.start_count(), 1);
        let status = container.status();
        assert_eq!(status.container_state, ContainerState::Running);
        assert!(!status.is_healthy, "healthy only after open");

        conn.emit(ConnectionEvent::open());
        drain().await;
        let status = container.status();
        assert!(status.is_healthy);
        assert_eq!(status.connection_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejected_while_running() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        let err = container.start().await.unwrap_err();
        assert_eq!(err.as_label(), "container_invalid_state");
        assert_eq!(conn.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_finalizes_stopped() {
        let conn = MockConnection::arc();
        conn.queue_start_err("no route to service");
        let container = spawn(conn.clone(), ContainerConfig::default());

        let err = container.start().await.unwrap_err();
        assert_eq!(err.as_label(), "container_start_failed");

        let status = container.status();
        assert_eq!(status.container_state, ContainerState::Stopped);
        assert!(!status.is_healthy);

        let history = container.event_history(None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind(), EventKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_first_reattempt_at_five_seconds() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        conn.emit(ConnectionEvent::close(Some("stream errored".into())));
        drain().await;
        let status = container.status();
        assert!(!status.is_healthy);
        assert_eq!(status.connection_attempts, 1);
        assert_eq!(status.container_state, ContainerState::Running);

        advance(Duration::from_millis(4_999)).await;
        drain().await;
        assert_eq!(conn.start_count(), 1, "too early to reattempt");

        advance(Duration::from_millis(1)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2, "reattempt due at 5s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_on_second_close() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        conn.emit(ConnectionEvent::close(None));
        drain().await;
        advance(Duration::from_secs(5)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2);

        conn.emit(ConnectionEvent::close(None));
        drain().await;
        assert_eq!(container.status().connection_attempts, 2);

        advance(Duration::from_secs(5)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2, "second delay is 10s, not 5s");

        advance(Duration::from_secs(5)).await;
        drain().await;
        assert_eq!(conn.start_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_exhaustion_parks_container() {
        let conn = MockConnection::arc();
        let cfg = ContainerConfig {
            reconnect: ReconnectPolicy {
                max_attempts: 3,
                ..ReconnectPolicy::default()
            },
            ..ContainerConfig::default()
        };
        let container = spawn_started(conn.clone(), cfg).await;

        for _ in 0..5 {
            conn.emit(ConnectionEvent::close(None));
            drain().await;
        }
        assert_eq!(container.status().connection_attempts, 3);

        // Only the attempt scheduled by the third close is pending.
        advance(Duration::from_secs(1_000)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2);

        // Further closes schedule nothing.
        conn.emit(ConnectionEvent::close(None));
        drain().await;
        assert_eq!(container.status().connection_attempts, 3);
        advance(Duration::from_secs(1_000)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2);

        // Container stays Running and merely unhealthy until stop/start.
        let status = container.status();
        assert_eq!(status.container_state, ContainerState::Running);
        assert!(!status.is_healthy);

        // Explicit stop + start resets the budget.
        container.stop().await.unwrap();
        container.start().await.unwrap();
        assert_eq!(container.status().connection_attempts, 0);
        conn.emit(ConnectionEvent::close(None));
        drain().await;
        assert_eq!(container.status().connection_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleven_closes_cap_attempts_at_ten() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        for _ in 0..11 {
            conn.emit(ConnectionEvent::close(None));
            drain().await;
        }
        assert_eq!(container.status().connection_attempts, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resets_attempts_and_disarms_reconnect() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        conn.emit(ConnectionEvent::close(None));
        drain().await;
        assert_eq!(container.status().connection_attempts, 1);

        // The session recovers on its own before the timer fires.
        conn.emit(ConnectionEvent::open());
        drain().await;
        assert_eq!(container.status().connection_attempts, 0);
        assert!(container.is_healthy());

        advance(Duration::from_secs(1_000)).await;
        drain().await;
        assert_eq!(conn.start_count(), 1, "moot reattempt must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        container.stop().await.unwrap();
        assert_eq!(container.status().container_state, ContainerState::Stopped);
        assert!(!container.is_healthy());
        assert_eq!(conn.stop_count(), 1);

        container.stop().await.unwrap();
        assert_eq!(container.status().container_state, ContainerState::Stopped);
        assert_eq!(conn.stop_count(), 1, "second stop short-circuits");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failure_still_finalizes_stopped() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;
        conn.queue_stop_err("socket stuck");

        let err = container.stop().await.unwrap_err();
        assert_eq!(err.as_label(), "container_stop_failed");
        let status = container.status();
        assert_eq!(status.container_state, ContainerState::Stopped);
        assert!(!status.is_healthy);

        // And the failure is on the audit trail.
        let history = container.event_history(None).await.unwrap();
        assert_eq!(history.last().unwrap().kind(), EventKind::Error);

        container.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_reconnect() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        conn.emit(ConnectionEvent::close(None));
        drain().await;
        container.stop().await.unwrap();

        advance(Duration::from_secs(1_000)).await;
        drain().await;
        assert_eq!(conn.start_count(), 1, "reconnect must not fire after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_flips_health_when_stale() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;
        assert!(container.is_healthy());

        // Ticks at 30s and 60s still see activity within the 60s threshold.
        advance(Duration::from_secs(30)).await;
        drain().await;
        assert!(container.is_healthy());
        advance(Duration::from_secs(30)).await;
        drain().await;
        assert!(container.is_healthy());

        // The 90s tick sees 90s of silence and flips health.
        advance(Duration::from_secs(30)).await;
        drain().await;
        assert!(!container.is_healthy());
        assert_eq!(
            container.status().container_state,
            ContainerState::Running,
            "staleness is a health drop, not a state change"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_activity_feeds_the_watchdog() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        advance(Duration::from_secs(40)).await;
        drain().await;
        conn.emit_upsert(0);
        drain().await;

        // Ticks at 60s and 90s are within 60s of the upsert at 40s.
        advance(Duration::from_secs(20)).await;
        drain().await;
        assert!(container.is_healthy());
        advance(Duration::from_secs(30)).await;
        drain().await;
        assert!(container.is_healthy());

        // Tick at 120s: 80s of silence.
        advance(Duration::from_secs(30)).await;
        drain().await;
        assert!(!container.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_panic_is_isolated() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        let hits = Arc::new(AtomicUsize::new(0));
        container
            .subscribe(EventKind::MessageUpsert, |_| panic!("listener bug"))
            .await
            .unwrap();
        let counter = Arc::clone(&hits);
        container
            .subscribe(EventKind::MessageUpsert, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        for tag in 0..3 {
            conn.emit_upsert(tag);
        }
        drain().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(container.is_healthy(), "panicking listener must not destabilize");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_is_idempotent() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = container
            .subscribe(EventKind::MessageUpsert, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(sub.kind(), EventKind::MessageUpsert);

        conn.emit_upsert(0);
        drain().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sub.unsubscribe().await;
        sub.unsubscribe().await;
        conn.emit_upsert(1);
        drain().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_caps_at_hundred_fifo() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        for tag in 0..105 {
            conn.emit_upsert(tag);
        }
        drain().await;

        let history = container.event_history(None).await.unwrap();
        assert_eq!(history.len(), 100);
        // The open update plus upserts 0..4 were evicted.
        assert_eq!(upsert_tag(&history[0]), Some(5));
        assert_eq!(upsert_tag(&history[99]), Some(104));
        for pair in history.windows(2) {
            assert!(pair[0].seq < pair[1].seq, "order preserved");
        }
        assert_eq!(container.status().event_history_size, 100);

        let recent = container.event_history(Some(10)).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(upsert_tag(&recent[0]), Some(95));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creds_update_refreshes_timestamp() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;
        let before = container.status().creds_last_updated;

        conn.emit(ConnectionEvent::CredsUpdate(crate::connection::CredsUpdate {
            creds: serde_json::json!({"keys": "rotated"}),
        }));
        drain().await;

        let status = container.status();
        assert!(status.creds_last_updated >= before);
        assert!(container.credential_age() < Duration::from_secs(5));

        let history = container.event_history(None).await.unwrap();
        assert_eq!(history.last().unwrap().kind(), EventKind::CredsUpdate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connecting_is_recorded_without_state_change() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        conn.emit(ConnectionEvent::connecting());
        drain().await;

        let status = container.status();
        assert_eq!(status.container_state, ContainerState::Running);
        assert!(status.is_healthy);
        assert_eq!(status.connection_attempts, 0);

        let history = container.event_history(None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind(), EventKind::ConnectionUpdate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reattempt_is_recorded_not_rescheduled() {
        let conn = MockConnection::arc();
        let container = spawn_started(conn.clone(), ContainerConfig::default()).await;

        conn.emit(ConnectionEvent::close(None));
        drain().await;
        conn.queue_start_err("dial failed");

        advance(Duration::from_secs(5)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2);

        let history = container.event_history(None).await.unwrap();
        assert_eq!(history.last().unwrap().kind(), EventKind::Error);
        assert_eq!(container.status().connection_attempts, 1);

        // No close followed, so nothing reschedules: recovery is event-driven.
        advance(Duration::from_secs(1_000)).await;
        drain().await;
        assert_eq!(conn.start_count(), 2);
        assert_eq!(container.status().container_state, ContainerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_fail_after_actor_teardown() {
        let conn = MockConnection::arc();
        let container = spawn(conn.clone(), ContainerConfig::default());

        container.cancel_actor();
        drain().await;

        let err = container.start().await.unwrap_err();
        assert_eq!(err.as_label(), "container_terminated");
    }
}
