//! Aggregated lab status: node health from the cluster plus log statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::LogEvent;

/// Health descriptor of a single cluster node.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Ready,
    NotReady,
    Unreachable,
}

/// Node name -> status. Ordered so serialized snapshots are stable.
pub type NodeHealth = BTreeMap<String, NodeStatus>;

/// Counters summarizing the log volume seen by the log watcher.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LogStats {
    pub lines: u64,
    pub hosts: BTreeMap<String, u64>,
    pub levels: BTreeMap<String, u64>,
}

impl LogStats {
    /// Count one event towards the totals.
    pub fn record(&mut self, event: &LogEvent) {
        self.lines += 1;
        *self.hosts.entry(event.host.clone()).or_default() += 1;
        if let Some(level) = &event.level {
            *self.levels.entry(level.clone()).or_default() += 1;
        }
    }
}

/// The snapshot pushed to status subscribers.
///
/// `talos` and `logs` are the field names existing dashboards parse.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatedStatus {
    #[serde(default)]
    pub talos: NodeHealth,
    #[serde(default)]
    pub logs: LogStats,
}

/// A status-affecting input; each variant replaces one field wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusUpdate {
    Health(NodeHealth),
    Stats(LogStats),
}

impl AggregatedStatus {
    pub fn apply(&mut self, update: StatusUpdate) {
        match update {
            StatusUpdate::Health(health) => self.talos = health,
            StatusUpdate::Stats(stats) => self.logs = stats,
        }
    }
}
