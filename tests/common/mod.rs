#![allow(dead_code)]

use labwatch::domain::{NodeHealth, NodeStatus};
use labwatch::fanout::{Hub, Subscription};
use labwatch::merge::{MergeLoop, MergeLoopStats, WatcherOutputs, watcher_channels};
use labwatch::status::StatusStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running merge loop with its watcher-side senders.
pub struct Harness {
    pub outputs: WatcherOutputs,
    pub hub: Hub,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<MergeLoopStats>,
}

impl Harness {
    pub fn start() -> Self {
        let (store, reader) = StatusStore::new();
        let hub = Hub::new(reader);
        let (outputs, inputs) = watcher_channels();
        let shutdown = CancellationToken::new();
        let handle = MergeLoop::new(store, hub.clone(), inputs).spawn(shutdown.clone());
        Self {
            outputs,
            hub,
            shutdown,
            handle,
        }
    }

    pub async fn stop(self) -> MergeLoopStats {
        self.shutdown.cancel();
        self.handle.await.unwrap()
    }
}

pub fn health(nodes: &[(&str, NodeStatus)]) -> NodeHealth {
    nodes
        .iter()
        .map(|(name, status)| (name.to_string(), *status))
        .collect()
}

pub async fn next<T>(sub: &mut Subscription<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("message within timeout")
        .expect("subscription open")
}

pub async fn assert_silent<T>(sub: &mut Subscription<T>) {
    let result = tokio::time::timeout(Duration::from_millis(100), sub.recv()).await;
    assert!(result.is_err(), "expected no further messages");
}
