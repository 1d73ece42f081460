//! Heartbeat monitor
//!
//! Periodic liveness sweep over every connected client. A client that fails
//! to acknowledge a probe across one full interval is evicted, so worst-case
//! eviction latency is two intervals.

use crate::hub::Hub;
use crate::protocol::ServerMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Sweeps client liveness on a fixed tick
pub struct HeartbeatMonitor {
    hub: Arc<Hub>,
    period: Duration,
    running: Arc<AtomicBool>,
}

impl HeartbeatMonitor {
    /// Create a monitor over a hub
    pub fn new(hub: Arc<Hub>, period: Duration) -> Arc<Self> {
        Arc::new(Self {
            hub,
            period,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start the background sweep task
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Heartbeat monitor is already running");
            return;
        }

        let monitor = self.clone();
        tokio::spawn(async move {
            monitor.run().await;
        });

        tracing::info!(period_ms = self.period.as_millis(), "Heartbeat monitor started");
    }

    /// Stop the background sweep task
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Heartbeat monitor stopped");
    }

    /// Check if the monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self) {
        let mut tick = interval(self.period);
        // The first tick fires immediately; skip it so clients get one full
        // interval to acknowledge before the first sweep.
        tick.tick().await;

        while self.running.load(Ordering::SeqCst) {
            tick.tick().await;
            self.sweep().await;
        }

        tracing::debug!("Heartbeat loop ended");
    }

    /// One liveness pass over all clients
    pub async fn sweep(&self) {
        let mut evicted = 0;

        for client in self.hub.clients() {
            if !client.is_alive() {
                tracing::warn!(
                    client_id = %client.id(),
                    "Client failed to acknowledge probe, evicting"
                );
                self.hub.disconnect_client(client.id()).await;
                evicted += 1;
                continue;
            }

            client.set_alive(false);
            if let Err(e) = client.try_send(ServerMessage::ping()) {
                // A full or closed queue counts as a missed probe; the next
                // sweep evicts the client.
                tracing::debug!(client_id = %client.id(), error = %e, "Probe not sent");
            }
        }

        if evicted > 0 {
            tracing::info!(evicted = evicted, "Unresponsive clients evicted");
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TypedEvent;
    use crate::rooms::InMemoryReplayProvider;
    use tokio::sync::mpsc;

    fn new_hub() -> Arc<Hub> {
        Hub::new(Arc::new(InMemoryReplayProvider::new(10)))
    }

    #[tokio::test]
    async fn test_acking_client_survives_sweeps() {
        let hub = new_hub();
        let monitor = HeartbeatMonitor::new(hub.clone(), Duration::from_secs(30));

        let (tx, mut rx) = mpsc::channel(10);
        let client = hub.accept(tx);

        for _ in 0..3 {
            monitor.sweep().await;
            match rx.recv().await.unwrap() {
                ServerMessage::Typed(TypedEvent::Ping) => {}
                other => panic!("expected ping, got {other:?}"),
            }
            hub.mark_alive(client.id()).await;
        }

        assert_eq!(hub.client_count(), 1);
    }

    #[tokio::test]
    async fn test_silent_client_evicted_on_second_sweep() {
        let hub = new_hub();
        let monitor = HeartbeatMonitor::new(hub.clone(), Duration::from_secs(30));

        let (tx, _rx) = mpsc::channel(10);
        let client = hub.accept(tx);
        hub.join_room(client.id(), "main", "viewer").await;

        // First sweep sends the probe and clears the flag
        monitor.sweep().await;
        assert_eq!(hub.client_count(), 1);

        // No ack arrives; the second sweep evicts, cascading the room leave
        monitor.sweep().await;
        assert_eq!(hub.client_count(), 0);
        assert!(hub.get_presence("main").is_empty());
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let hub = new_hub();
        let monitor = HeartbeatMonitor::new(hub, Duration::from_secs(30));

        assert!(!monitor.is_running());
        monitor.clone().start();
        assert!(monitor.is_running());
        // Starting twice is a logged no-op
        monitor.clone().start();
        assert!(monitor.is_running());

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
