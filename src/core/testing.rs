//! Shared test doubles for the core modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::connection::{Connection, ConnectionEvent, MessageUpsert};
use crate::error::ConnectionError;

/// Scriptable connection: counts start/stop calls, pops queued results
/// (defaulting to `Ok`), and lets tests inject events.
pub(crate) struct MockConnection {
    tx: broadcast::Sender<ConnectionEvent>,
    start_results: Mutex<VecDeque<Result<(), ConnectionError>>>,
    stop_results: Mutex<VecDeque<Result<(), ConnectionError>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn arc() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256);
        Arc::new(Self {
            tx,
            start_results: Mutex::new(VecDeque::new()),
            stop_results: Mutex::new(VecDeque::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub(crate) fn queue_start_err(&self, message: &str) {
        self.start_results
            .lock()
            .unwrap()
            .push_back(Err(ConnectionError::new(message)));
    }

    pub(crate) fn queue_stop_err(&self, message: &str) {
        self.stop_results
            .lock()
            .unwrap()
            .push_back(Err(ConnectionError::new(message)));
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        // No receivers yet is fine: the container subscribes on start().
        let _ = self.tx.send(event);
    }

    /// Emits a tagged message upsert; the tag round-trips via `update_type`.
    pub(crate) fn emit_upsert(&self, tag: usize) {
        self.emit(ConnectionEvent::MessageUpsert(MessageUpsert {
            messages: vec![],
            update_type: tag.to_string(),
        }));
    }

    pub(crate) fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn start(&self) -> Result<(), ConnectionError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.start_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stop_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tx.subscribe()
    }
}

/// Yields to the scheduler until container actors have drained everything
/// currently ready. Paused-clock tests call this between injecting events
/// and asserting; it never advances time.
pub(crate) async fn drain() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
