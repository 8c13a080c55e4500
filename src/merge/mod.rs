//! The merge loop: single owner of the status store and sole driver of
//! broadcasts.
//!
//! Watchers push into bounded `mpsc` channels; the loop waits on all of them
//! at once, folds status updates into the store, and fans out the committed
//! snapshot or the raw event to the matching registry.

use crate::domain::{LogEvent, LogStats, NodeHealth, StatusUpdate};
use crate::fanout::Hub;
use crate::status::StatusStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Capacity of each watcher -> merge loop channel.
pub const WATCHER_CHANNEL_CAPACITY: usize = 64;

/// Receiving ends consumed by the merge loop.
pub struct WatcherInputs {
    pub health: mpsc::Receiver<NodeHealth>,
    pub stats: mpsc::Receiver<LogStats>,
    pub events: mpsc::Receiver<LogEvent>,
}

/// Sending ends handed to the watchers.
#[derive(Clone)]
pub struct WatcherOutputs {
    pub health: mpsc::Sender<NodeHealth>,
    pub stats: mpsc::Sender<LogStats>,
    pub events: mpsc::Sender<LogEvent>,
}

#[must_use]
pub fn watcher_channels() -> (WatcherOutputs, WatcherInputs) {
    let (health_tx, health_rx) = mpsc::channel(WATCHER_CHANNEL_CAPACITY);
    let (stats_tx, stats_rx) = mpsc::channel(WATCHER_CHANNEL_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(WATCHER_CHANNEL_CAPACITY);
    (
        WatcherOutputs {
            health: health_tx,
            stats: stats_tx,
            events: events_tx,
        },
        WatcherInputs {
            health: health_rx,
            stats: stats_rx,
            events: events_rx,
        },
    )
}

/// Counters reported when the loop stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeLoopStats {
    pub status_broadcasts: u64,
    pub events_forwarded: u64,
    pub inputs_closed: u8,
}

pub struct MergeLoop {
    store: StatusStore,
    hub: Hub,
    inputs: WatcherInputs,
}

impl MergeLoop {
    #[must_use]
    pub fn new(store: StatusStore, hub: Hub, inputs: WatcherInputs) -> Self {
        Self { store, hub, inputs }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<MergeLoopStats> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// A closed input is logged once and disabled; the remaining inputs keep
    /// being served and the affected field simply stays at its last value.
    pub async fn run(self, shutdown: CancellationToken) -> MergeLoopStats {
        let Self {
            mut store,
            hub,
            mut inputs,
        } = self;
        let mut stats = MergeLoopStats::default();
        let mut health_open = true;
        let mut stats_open = true;
        let mut events_open = true;

        info!("Merge loop started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,

                update = inputs.health.recv(), if health_open => match update {
                    Some(health) => store.apply(StatusUpdate::Health(health)),
                    None => {
                        health_open = false;
                        stats.inputs_closed += 1;
                        error!("Node health watcher stopped; node health will no longer update");
                    }
                },

                update = inputs.stats.recv(), if stats_open => match update {
                    Some(log_stats) => store.apply(StatusUpdate::Stats(log_stats)),
                    None => {
                        stats_open = false;
                        stats.inputs_closed += 1;
                        error!("Log stats channel closed; log statistics will no longer update");
                    }
                },

                event = inputs.events.recv(), if events_open => match event {
                    Some(event) => {
                        let registry = hub.event_registry();
                        debug!(clients = registry.len(), "Broadcasting event");
                        registry.broadcast(&Arc::new(event));
                        stats.events_forwarded += 1;
                    }
                    None => {
                        events_open = false;
                        stats.inputs_closed += 1;
                        error!("Log event channel closed; no more events will be forwarded");
                    }
                },
            }

            if let Some(snapshot) = store.commit() {
                let registry = hub.status_registry();
                debug!(clients = registry.len(), "Broadcasting status");
                registry.broadcast(&snapshot);
                stats.status_broadcasts += 1;
            }
        }

        info!(
            status_broadcasts = stats.status_broadcasts,
            events_forwarded = stats.events_forwarded,
            "Merge loop stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AggregatedStatus, NodeStatus};
    use std::time::Duration;
    use tokio::time::timeout;

    fn setup() -> (WatcherOutputs, Hub, MergeLoop) {
        let (store, reader) = StatusStore::new();
        let hub = Hub::new(reader);
        let (outputs, inputs) = watcher_channels();
        let merge = MergeLoop::new(store, hub.clone(), inputs);
        (outputs, hub, merge)
    }

    async fn next<T>(sub: &mut crate::fanout::Subscription<T>) -> T {
        timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("message within timeout")
            .expect("subscription open")
    }

    #[tokio::test]
    async fn health_update_is_published_and_broadcast() {
        let (outputs, hub, merge) = setup();
        let shutdown = CancellationToken::new();
        let mut sub = hub.subscribe_status().unwrap();
        let handle = merge.spawn(shutdown.clone());

        assert_eq!(*next(&mut sub).await, AggregatedStatus::default());

        outputs
            .health
            .send(NodeHealth::from([("n1".to_string(), NodeStatus::Ready)]))
            .await
            .unwrap();

        let update = next(&mut sub).await;
        assert_eq!(update.talos.get("n1"), Some(&NodeStatus::Ready));
        assert_eq!(*hub.current(), *update);

        shutdown.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.status_broadcasts, 1);
        assert_eq!(stats.events_forwarded, 0);
    }

    #[tokio::test]
    async fn events_do_not_touch_status() {
        let (outputs, hub, merge) = setup();
        let shutdown = CancellationToken::new();
        let mut events = hub.subscribe_events().unwrap();
        let handle = merge.spawn(shutdown.clone());

        outputs.events.send(LogEvent::new("n1", "boot")).await.unwrap();
        assert_eq!(next(&mut events).await.msg, "boot");
        assert_eq!(*hub.current(), AggregatedStatus::default());

        shutdown.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.status_broadcasts, 0);
        assert_eq!(stats.events_forwarded, 1);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn closed_input_is_logged_once() {
        let (outputs, _hub, merge) = setup();
        let shutdown = CancellationToken::new();
        let WatcherOutputs { health, .. } = outputs.clone();
        drop(health);

        let stop = async {
            drop(outputs);
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.cancel();
        };
        let (stats, ()) = tokio::join!(merge.run(shutdown.clone()), stop);

        assert_eq!(stats.inputs_closed, 3);
        assert!(logs_contain("Node health watcher stopped"));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("Node health watcher stopped"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one closure log, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn loop_survives_all_inputs_closing() {
        let (outputs, _hub, merge) = setup();
        let shutdown = CancellationToken::new();
        let handle = merge.spawn(shutdown.clone());

        drop(outputs);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        shutdown.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.inputs_closed, 3);
    }
}
