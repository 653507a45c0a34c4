//! # Example: fleet
//!
//! Runs several containers under one registry, tails the fleet-wide event
//! stream, and prints an aggregate health report.
//!
//! ## Run
//! ```bash
//! cargo run --example fleet
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use connvisor::{
    Connection, ConnectionError, ConnectionEvent, ContainerConfig, ContainerIdentity,
    ContainerRegistry, MessageUpsert,
};

/// A healthy session that emits a message batch every second.
struct ChattyConnection {
    events: broadcast::Sender<ConnectionEvent>,
}

impl ChattyConnection {
    fn arc() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self { events })
    }
}

#[async_trait]
impl Connection for ChattyConnection {
    async fn start(&self) -> Result<(), ConnectionError> {
        let _ = self.events.send(ConnectionEvent::open());
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let sent = events.send(ConnectionEvent::MessageUpsert(MessageUpsert {
                    messages: vec![serde_json::json!({"text": "hello"})],
                    update_type: "notify".into(),
                }));
                if sent.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
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

    let registry = ContainerRegistry::new(ContainerConfig::default());

    // Tail the fleet-wide "all events" stream.
    let mut stream = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = stream.recv().await {
            println!(
                "[fleet] seq={} container={} kind={}",
                event.seq,
                event.container,
                event.kind().as_label()
            );
        }
    });

    for bot in ["support-bot", "sales-bot", "ops-bot"] {
        let container = registry
            .create(ContainerIdentity::new("acme", bot), ChattyConnection::arc())
            .await;
        container.start().await?;
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    println!();
    println!("Fleet health:");
    let mut report: Vec<_> = registry.health_report().await.into_iter().collect();
    report.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (identity, status) in report {
        println!(
            " ├─► {identity}: {} ({}; {} events, {} attempts)",
            status.derived_status(),
            status.container_state,
            status.event_history_size,
            status.connection_attempts
        );
    }

    registry.shutdown().await;
    Ok(())
}
