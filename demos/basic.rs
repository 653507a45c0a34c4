//! # Example: basic
//!
//! Supervises a single flaky connection: the session opens, drops twice, and
//! is recovered automatically with exponential backoff.
//!
//! ## Flow
//! ```text
//! Container::start()
//!   ├─► Connection::start() → phase: open
//!   ├─► [5s] connection drops → phase: close
//!   │     ├─► attempts = 1, reconnect scheduled at 5s
//!   │     └─► timer due → Connection::start() → phase: open (attempts = 0)
//!   └─► status() → running / healthy
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use connvisor::{
    Connection, ConnectionError, ConnectionEvent, ContainerConfig, ContainerIdentity,
    ContainerRegistry, EventKind, ReconnectPolicy,
};

/// A session that drops the first two opens shortly after establishing.
struct FlakyConnection {
    events: broadcast::Sender<ConnectionEvent>,
    opens: AtomicU64,
}

impl FlakyConnection {
    fn arc() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            opens: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Connection for FlakyConnection {
    async fn start(&self) -> Result<(), ConnectionError> {
        let open = self.opens.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[connection] open #{open}");
        let _ = self.events.send(ConnectionEvent::open());

        // The first two sessions drop after two seconds.
        if open <= 2 {
            let events = self.events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                println!("[connection] dropped");
                let _ = events.send(ConnectionEvent::close(Some("simulated drop".into())));
            });
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        println!("[connection] stopped");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("connvisor=debug")
        .init();

    // 1. Short delays so the demo recovers quickly.
    let cfg = ContainerConfig {
        reconnect: ReconnectPolicy {
            first: Duration::from_secs(1),
            ..ReconnectPolicy::default()
        },
        ..ContainerConfig::default()
    };
    let registry = ContainerRegistry::new(cfg);

    // 2. Materialize one container and watch its connection updates.
    let container = registry
        .create(
            ContainerIdentity::new("acme", "support-bot"),
            FlakyConnection::arc(),
        )
        .await;
    container
        .subscribe(EventKind::ConnectionUpdate, |event| {
            println!("[listener] seq={} {:?}", event.seq, event.payload);
        })
        .await?;

    // 3. Start and let the backoff recovery play out.
    container.start().await?;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = container.status();
    println!();
    println!("Status:");
    println!(" ├─► state:     {}", status.container_state);
    println!(" ├─► healthy:   {}", status.is_healthy);
    println!(" ├─► attempts:  {}", status.connection_attempts);
    println!(" └─► history:   {} events", status.event_history_size);

    registry.shutdown().await;
    Ok(())
}
