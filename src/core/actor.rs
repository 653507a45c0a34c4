//! # ContainerActor: single-connection supervisor task.
//!
//! One actor task owns everything mutable about a container: the lifecycle
//! state machine, the health record, the event history, the listener set,
//! and both timers. All mutation happens on this one task; external readers
//! only ever see [`StatusSnapshot`]s published through a `watch` channel.
//!
//! ## Architecture
//! ```text
//! Container handle ── mpsc Command ──► ContainerActor::run()
//! Connection ──────── broadcast ─────►      │
//! heartbeat Interval (armed on open) ──►    │ one select! loop,
//! reconnect Sleep (armed on close) ────►    │ one owner for all state
//!                                           ▼
//!              history.push ──► listeners.deliver ──► bus.publish
//!                                           │
//!                     status_tx.send_replace(StatusSnapshot)
//! ```
//!
//! ## Rules
//! - Events from one connection are processed **sequentially, in order**.
//! - The heartbeat is an **activity watchdog**: it never talks to the
//!   connection, it only judges the age of the last observed activity.
//! - Reconnection is **event-driven, not self-perpetuating**: a close
//!   schedules at most one reattempt; a failed reattempt waits for the
//!   connection to report another close.
//! - Both timers live inside the actor as disarmable state, so `stop()`
//!   disarms any pending reconnect before another message is processed —
//!   a reconnect can never fire after teardown.

use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;

use crate::config::ContainerConfig;
use crate::connection::{
    ConnectionEvent, ConnectionPhase, ConnectionRef, ConnectionUpdate, ErrorNotice,
};
use crate::core::health::{ContainerState, HealthRecord, StatusSnapshot};
use crate::error::ContainerError;
use crate::events::{Bus, ContainerEvent, EventHistory, EventKind, Listener, ListenerSet};

/// Requests a [`Container`](crate::Container) handle sends to its actor.
pub(crate) enum Command {
    Start {
        reply: oneshot::Sender<Result<(), ContainerError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), ContainerError>>,
    },
    History {
        limit: Option<usize>,
        reply: oneshot::Sender<Vec<ContainerEvent>>,
    },
    Subscribe {
        kind: EventKind,
        listener: Listener,
        reply: oneshot::Sender<u64>,
    },
    Unsubscribe {
        kind: EventKind,
        id: u64,
    },
}

/// What the select loop resolved to on one turn.
enum Turn {
    Cancelled,
    Command(Option<Command>),
    Conn(Result<ConnectionEvent, broadcast::error::RecvError>),
    Heartbeat,
    ReconnectDue,
}

/// Supervises one connection: lifecycle, watchdog, recovery, event fan-out.
pub(crate) struct ContainerActor {
    /// Rendered identity, shared into every captured event.
    label: Arc<str>,
    connection: ConnectionRef,
    cfg: ContainerConfig,
    bus: Bus,
    cmd_rx: mpsc::Receiver<Command>,
    status_tx: watch::Sender<StatusSnapshot>,

    state: ContainerState,
    health: HealthRecord,
    history: EventHistory,
    listeners: ListenerSet,
    /// Armed while subscribed to the connection's event stream.
    conn_rx: Option<broadcast::Receiver<ConnectionEvent>>,
    /// Armed from `open` until `close` or `stop()`.
    heartbeat: Option<Interval>,
    /// Armed by a close within budget; disarmed by `open`, firing, or `stop()`.
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl ContainerActor {
    pub(crate) fn new(
        label: Arc<str>,
        connection: ConnectionRef,
        cfg: ContainerConfig,
        bus: Bus,
        cmd_rx: mpsc::Receiver<Command>,
        status_tx: watch::Sender<StatusSnapshot>,
    ) -> Self {
        let history = EventHistory::new(cfg.max_history);
        Self {
            label,
            connection,
            cfg,
            bus,
            cmd_rx,
            status_tx,
            state: ContainerState::Initializing,
            health: HealthRecord::new(),
            history,
            listeners: ListenerSet::new(),
            conn_rx: None,
            heartbeat: None,
            reconnect: None,
        }
    }

    /// Runs the actor until its token is cancelled or every handle is dropped.
    ///
    /// Each loop turn resolves exactly one input (a command, a connection
    /// event, a watchdog tick, or a due reconnect) and applies it with
    /// exclusive access to all state. The select arms borrow disjoint fields;
    /// the resolved [`Turn`] is handled after the other futures are dropped.
    pub(crate) async fn run(mut self, token: CancellationToken) {
        loop {
            // Evaluated before the branch futures borrow their fields.
            let conn_armed = self.conn_rx.is_some();
            let heartbeat_armed = self.heartbeat.is_some();
            let reconnect_armed = self.reconnect.is_some();

            let turn = tokio::select! {
                _ = token.cancelled() => Turn::Cancelled,
                cmd = self.cmd_rx.recv() => Turn::Command(cmd),
                ev = async { self.conn_rx.as_mut().expect("conn stream armed").recv().await },
                    if conn_armed => Turn::Conn(ev),
                _ = async { self.heartbeat.as_mut().expect("heartbeat armed").tick().await },
                    if heartbeat_armed => Turn::Heartbeat,
                _ = async { self.reconnect.as_mut().expect("reconnect armed").await },
                    if reconnect_armed => Turn::ReconnectDue,
            };

            match turn {
                Turn::Cancelled | Turn::Command(None) => break,
                Turn::Command(Some(cmd)) => self.handle_command(cmd).await,
                Turn::Conn(Ok(event)) => self.handle_connection_event(event),
                Turn::Conn(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        container = %self.label,
                        skipped,
                        "connection event stream lagged; events were missed"
                    );
                }
                Turn::Conn(Err(broadcast::error::RecvError::Closed)) => {
                    tracing::debug!(container = %self.label, "connection event stream closed");
                    self.conn_rx = None;
                }
                Turn::Heartbeat => self.on_heartbeat_tick(),
                Turn::ReconnectDue => self.on_reconnect_due().await,
            }
        }
        tracing::debug!(container = %self.label, "container actor exiting");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { reply } => {
                let res = self.do_start().await;
                let _ = reply.send(res);
            }
            Command::Stop { reply } => {
                let res = self.do_stop().await;
                let _ = reply.send(res);
            }
            Command::History { limit, reply } => {
                let _ = reply.send(self.history.snapshot(limit));
            }
            Command::Subscribe {
                kind,
                listener,
                reply,
            } => {
                let _ = reply.send(self.listeners.insert(kind, listener));
            }
            Command::Unsubscribe { kind, id } => self.listeners.remove(kind, id),
        }
    }

    /// Opens the connection and enters `Running`.
    ///
    /// The watchdog is not armed here: it starts once the connection reports
    /// `open`. A failed open finalizes at `Stopped` and is not retried; the
    /// caller owns cold-start retry policy.
    async fn do_start(&mut self) -> Result<(), ContainerError> {
        if !self.state.can_start() {
            return Err(ContainerError::InvalidState {
                expected: "initializing or stopped",
                actual: self.state,
            });
        }

        // Subscribe before opening so the initial phase updates are observed.
        self.conn_rx = Some(self.connection.subscribe());
        self.state = ContainerState::Running;
        self.health.connection_attempts = 0;
        self.publish_status();

        match self.connection.start().await {
            Ok(()) => {
                tracing::debug!(container = %self.label, "connection starting; awaiting open");
                Ok(())
            }
            Err(err) => {
                self.record(ConnectionEvent::Error(ErrorNotice {
                    message: format!("start failed: {err}"),
                    code: err.code.clone(),
                }));
                self.conn_rx = None;
                self.state = ContainerState::Stopped;
                self.health.is_healthy = false;
                self.publish_status();
                Err(ContainerError::Start { source: err })
            }
        }
    }

    /// Tears the connection down, best-effort, always finalizing at `Stopped`.
    ///
    /// Idempotent: stopping an already-stopped container is a no-op. Disarms
    /// the watchdog and any pending reconnect before touching the connection.
    async fn do_stop(&mut self) -> Result<(), ContainerError> {
        if self.state == ContainerState::Stopped {
            return Ok(());
        }

        self.state = ContainerState::Stopping;
        self.heartbeat = None;
        self.reconnect = None;
        self.conn_rx = None;
        self.publish_status();

        let res = self.connection.stop().await;
        self.state = ContainerState::Stopped;
        self.health.is_healthy = false;
        self.publish_status();

        match res {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    container = %self.label,
                    error = %err,
                    "connection stop failed; container stopped anyway"
                );
                self.record(ConnectionEvent::Error(ErrorNotice {
                    message: format!("stop failed: {err}"),
                    code: err.code.clone(),
                }));
                self.publish_status();
                Err(ContainerError::Stop { source: err })
            }
        }
    }

    /// Classifies, records, and republishes one inbound connection event.
    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::ConnectionUpdate(update) => self.on_connection_update(update),
            ConnectionEvent::MessageUpsert(_) | ConnectionEvent::PresenceUpdate(_) => {
                self.health.touch();
            }
            ConnectionEvent::CredsUpdate(_) => {
                self.health.creds_last_updated = Utc::now();
                self.health.touch();
            }
            ConnectionEvent::Error(notice) => {
                tracing::debug!(
                    container = %self.label,
                    message = %notice.message,
                    "connection reported error"
                );
            }
        }
        self.record(event);
        self.publish_status();
    }

    fn on_connection_update(&mut self, update: &ConnectionUpdate) {
        match update.phase {
            ConnectionPhase::Open => {
                self.health.is_healthy = true;
                self.health.connection_attempts = 0;
                self.health.touch();
                // The session recovered; a pending reattempt is moot.
                self.reconnect = None;
                self.arm_heartbeat();
                tracing::debug!(container = %self.label, "connection open");
            }
            ConnectionPhase::Close => {
                self.health.is_healthy = false;
                self.heartbeat = None;

                if self.cfg.reconnect.budget_left(self.health.connection_attempts) {
                    self.health.connection_attempts += 1;
                    let attempt = self.health.connection_attempts;
                    let delay = self.cfg.reconnect.delay_for(attempt);
                    self.reconnect = Some(Box::pin(time::sleep(delay)));
                    tracing::debug!(
                        container = %self.label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = update.last_disconnect_reason.as_deref(),
                        "reconnect scheduled"
                    );
                } else {
                    tracing::debug!(
                        container = %self.label,
                        attempts = self.health.connection_attempts,
                        "reconnect budget exhausted; holding at reduced health until stop/start"
                    );
                }
            }
            ConnectionPhase::Connecting => {}
        }
    }

    /// Watchdog tick: health is true only while `Running` with fresh activity.
    fn on_heartbeat_tick(&mut self) {
        let fresh = self.health.heartbeat_fresh(self.cfg.stale_after());
        let healthy = self.state == ContainerState::Running && fresh;
        if self.health.is_healthy && !healthy {
            tracing::warn!(
                container = %self.label,
                "connection stale: no inbound activity within threshold"
            );
        }
        self.health.is_healthy = healthy;
        self.publish_status();
    }

    /// A scheduled reattempt came due: open the connection again.
    ///
    /// No new subscription is created and the container stays `Running`.
    /// A failed reattempt is recorded and logged but does not reschedule:
    /// the next attempt happens only when the connection reports another
    /// close within budget.
    async fn on_reconnect_due(&mut self) {
        self.reconnect = None;
        if self.state != ContainerState::Running {
            return;
        }

        let attempt = self.health.connection_attempts;
        tracing::debug!(container = %self.label, attempt, "reconnect attempt");
        if let Err(err) = self.connection.start().await {
            tracing::warn!(
                container = %self.label,
                attempt,
                error = %err,
                "reconnect attempt failed; waiting for the connection to report close"
            );
            self.record(ConnectionEvent::Error(ErrorNotice {
                message: format!("reconnect attempt {attempt} failed: {err}"),
                code: err.code,
            }));
            self.publish_status();
        }
    }

    fn arm_heartbeat(&mut self) {
        let period = self.cfg.heartbeat_interval;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(interval);
    }

    /// Wraps a payload and runs it through the pipeline:
    /// history → listeners → fleet bus.
    fn record(&mut self, payload: ConnectionEvent) {
        let event = ContainerEvent::capture(Arc::clone(&self.label), payload);
        self.history.push(event.clone());
        self.listeners.deliver(&event);
        self.bus.publish(event);
    }

    fn publish_status(&self) {
        let snapshot = StatusSnapshot {
            container_id: self.label.to_string(),
            container_state: self.state,
            is_healthy: self.health.is_healthy,
            last_heartbeat: self.health.last_heartbeat,
            connection_attempts: self.health.connection_attempts,
            creds_last_updated: self.health.creds_last_updated,
            event_history_size: self.history.len(),
        };
        self.status_tx.send_replace(snapshot);
    }
}
