//! Cluster node health watcher.
//!
//! Probes one HTTP health URL per node on a fixed interval and emits the full
//! [`NodeHealth`] map whenever any node changed state.

use super::WatcherError;
use crate::domain::{NodeHealth, NodeStatus};
use futures::future::join_all;
use reqwest::Url;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct NodeWatcherConfig {
    pub cluster: String,
    /// Node name -> health probe URL.
    pub nodes: BTreeMap<String, String>,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
}

pub struct NodeWatcher {
    cluster: String,
    nodes: Vec<(String, Url)>,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl NodeWatcher {
    pub fn new(config: NodeWatcherConfig) -> Result<Self, WatcherError> {
        if config.cluster.trim().is_empty() {
            return Err(WatcherError::InvalidConfig("Cluster name cannot be empty".into()));
        }
        if config.nodes.is_empty() {
            return Err(WatcherError::InvalidConfig(format!(
                "No nodes configured for cluster {}",
                config.cluster
            )));
        }

        if config.poll_interval.is_zero() {
            return Err(WatcherError::InvalidConfig("Node poll interval must be non-zero".into()));
        }

        let nodes = config
            .nodes
            .into_iter()
            .map(|(name, url)| match Url::parse(&url) {
                Ok(parsed) => Ok((name, parsed)),
                Err(e) => Err(WatcherError::InvalidConfig(format!(
                    "Invalid probe URL for node {name}: {e}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .map_err(WatcherError::Client)?;

        info!(cluster = %config.cluster, nodes = nodes.len(), "Node watcher initialized");
        Ok(Self {
            cluster: config.cluster,
            nodes,
            poll_interval: config.poll_interval,
            client,
        })
    }

    /// Probe all nodes until cancelled, sending a snapshot on every change.
    pub async fn watch(
        self,
        shutdown: CancellationToken,
        health: mpsc::Sender<NodeHealth>,
    ) -> Result<(), WatcherError> {
        let mut last: Option<NodeHealth> = None;
        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(cluster = %self.cluster, "Node watcher stopping");
                    return Ok(());
                }
                _ = tick.tick() => {
                    let current = self.probe_all().await;
                    if last.as_ref() == Some(&current) {
                        continue;
                    }
                    debug!(cluster = %self.cluster, ?current, "Node health changed");
                    if health.send(current.clone()).await.is_err() {
                        return Ok(());
                    }
                    last = Some(current);
                }
            }
        }
    }

    async fn probe_all(&self) -> NodeHealth {
        let probes = self.nodes.iter().map(|(name, url)| async move {
            (name.clone(), probe(&self.client, url.clone()).await)
        });
        join_all(probes).await.into_iter().collect()
    }
}

async fn probe(client: &reqwest::Client, url: Url) -> NodeStatus {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => NodeStatus::Ready,
        Ok(_) => NodeStatus::NotReady,
        Err(_) => NodeStatus::Unreachable,
    }
}
