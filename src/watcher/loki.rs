//! Loki log watcher.
//!
//! Polls `query_range` with a forward-moving nanosecond cursor, emits one
//! [`LogEvent`] per returned line and periodically publishes the accumulated
//! [`LogStats`].

use super::WatcherError;
use crate::domain::{LogEvent, LogStats};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const READY_PATH: &str = "/ready";
const QUERY_RANGE_PATH: &str = "/loki/api/v1/query_range";

/// Labels checked, in order, for the originating host.
const HOST_LABELS: [&str; 2] = ["host_name", "host"];
/// Labels checked, in order, for the log level.
const LEVEL_LABELS: [&str; 2] = ["level", "detected_level"];
const UNKNOWN_HOST: &str = "unknown";

#[derive(Debug, Clone)]
pub struct LokiConfig {
    /// Base URL, e.g. `http://boss.local:3100`.
    pub address: String,
    /// LogQL query, e.g. `{ host_name =~ ".+" } | json`.
    pub query: String,
    pub poll_interval: Duration,
    pub stats_interval: Duration,
    pub request_timeout: Duration,
    /// Maximum lines fetched per poll.
    pub limit: u32,
    pub max_consecutive_failures: u32,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            address: "http://boss.local:3100".to_string(),
            query: r#"{ host_name =~ ".+" } | json"#.to_string(),
            poll_interval: Duration::from_secs(1),
            stats_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            limit: 1000,
            max_consecutive_failures: 30,
        }
    }
}

pub struct LokiWatcher {
    config: LokiConfig,
    client: reqwest::Client,
}

impl LokiWatcher {
    /// Build the client and check that Loki answers on `/ready`.
    pub async fn new(config: LokiConfig) -> Result<Self, WatcherError> {
        if config.address.trim().is_empty() {
            return Err(WatcherError::InvalidConfig("Loki address cannot be empty".into()));
        }
        if config.query.trim().is_empty() {
            return Err(WatcherError::InvalidConfig("Loki query cannot be empty".into()));
        }
        if config.poll_interval.is_zero() || config.stats_interval.is_zero() {
            return Err(WatcherError::InvalidConfig("Loki intervals must be non-zero".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(WatcherError::Client)?;

        let url = format!("{}{READY_PATH}", config.address.trim_end_matches('/'));
        let unreachable = |reason: String| WatcherError::Unreachable {
            address: config.address.clone(),
            reason,
        };
        let resp = client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(unreachable(format!("{url} returned {}", resp.status())));
        }

        info!(address = %config.address, query = %config.query, "Loki watcher initialized");
        Ok(Self { config, client })
    }

    /// Stream events and statistics until cancelled.
    ///
    /// Transient poll failures are retried on the next tick; after
    /// `max_consecutive_failures` in a row the watcher gives up and returns
    /// an error, closing both channels.
    pub async fn watch(
        self,
        shutdown: CancellationToken,
        events: mpsc::Sender<LogEvent>,
        stats: mpsc::Sender<LogStats>,
    ) -> Result<(), WatcherError> {
        let mut cursor = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut totals = LogStats::default();
        let mut last_sent: Option<LogStats> = None;
        let mut failures = 0u32;

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = tokio::time::interval(self.config.stats_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Loki watcher stopping");
                    return Ok(());
                }

                _ = poll.tick() => match self.poll(cursor).await {
                    Ok(batch) => {
                        failures = 0;
                        if !batch.is_empty() {
                            debug!(lines = batch.len(), "Fetched log lines");
                        }
                        for (ts, event) in batch {
                            cursor = cursor.max(ts.saturating_add(1));
                            totals.record(&event);
                            if events.send(event).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(error = %e, failures, "Loki poll failed");
                        if failures >= self.config.max_consecutive_failures {
                            return Err(WatcherError::GaveUp {
                                failures,
                                last_error: e.to_string(),
                            });
                        }
                    }
                },

                _ = report.tick() => {
                    if last_sent.as_ref() != Some(&totals) {
                        if stats.send(totals.clone()).await.is_err() {
                            return Ok(());
                        }
                        last_sent = Some(totals.clone());
                    }
                }
            }
        }
    }

    async fn poll(&self, start_ns: i64) -> Result<Vec<(i64, LogEvent)>, reqwest::Error> {
        let url = format!("{}{QUERY_RANGE_PATH}", self.config.address.trim_end_matches('/'));
        let body: QueryResponse = self
            .client
            .get(&url)
            .query(&[
                ("query", self.config.query.clone()),
                ("start", start_ns.to_string()),
                ("limit", self.config.limit.to_string()),
                ("direction", "forward".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(into_events(body))
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<StreamResult>,
}

#[derive(Debug, Deserialize)]
struct StreamResult {
    #[serde(default)]
    stream: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<LokiEntry>,
}

/// `[ "<ns timestamp>", "<line>", {optional metadata} ]`
#[derive(Debug, Deserialize)]
#[serde(try_from = "Vec<Value>")]
struct LokiEntry {
    timestamp_ns: i64,
    line: String,
}

impl TryFrom<Vec<Value>> for LokiEntry {
    type Error = String;

    fn try_from(parts: Vec<Value>) -> Result<Self, Self::Error> {
        let mut parts = parts.into_iter();
        let timestamp_ns = parts
            .next()
            .and_then(|v| v.as_str().and_then(|s| s.parse::<i64>().ok()))
            .ok_or("entry timestamp must be a nanosecond string")?;
        let line = match parts.next() {
            Some(Value::String(line)) => line,
            _ => return Err("entry line must be a string".to_string()),
        };
        Ok(Self { timestamp_ns, line })
    }
}

/// Flatten all streams into events ordered by timestamp.
fn into_events(body: QueryResponse) -> Vec<(i64, LogEvent)> {
    let mut out: Vec<(i64, LogEvent)> = body
        .data
        .result
        .into_iter()
        .flat_map(|stream| {
            let labels = stream.stream;
            stream
                .values
                .into_iter()
                .map(move |entry| (entry.timestamp_ns, to_event(&labels, entry)))
        })
        .collect();
    out.sort_by_key(|(ts, _)| *ts);
    out
}

fn to_event(labels: &BTreeMap<String, String>, entry: LokiEntry) -> LogEvent {
    let first_label = |keys: &[&str]| keys.iter().find_map(|k| labels.get(*k).cloned());
    LogEvent {
        host: first_label(&HOST_LABELS).unwrap_or_else(|| UNKNOWN_HOST.to_string()),
        msg: entry.line,
        level: first_label(&LEVEL_LABELS),
        timestamp: DateTime::from_timestamp_nanos(entry.timestamp_ns),
        labels: labels.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<(i64, LogEvent)> {
        into_events(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn streams_are_merged_in_timestamp_order() {
        let events = parse(
            r#"{"status":"success","data":{"resultType":"streams","result":[
                {"stream":{"host_name":"n2","level":"error"},"values":[["300","late"],["100","early"]]},
                {"stream":{"host_name":"n1"},"values":[["200","middle"]]}
            ]}}"#,
        );

        let lines: Vec<&str> = events.iter().map(|(_, e)| e.msg.as_str()).collect();
        assert_eq!(lines, ["early", "middle", "late"]);
        assert_eq!(events[0].1.host, "n2");
        assert_eq!(events[0].1.level.as_deref(), Some("error"));
        assert_eq!(events[1].1.host, "n1");
        assert_eq!(events[1].1.level, None);
    }

    #[test]
    fn host_falls_back_to_host_label_then_unknown() {
        let events = parse(
            r#"{"data":{"result":[
                {"stream":{"host":"h1","detected_level":"warn"},"values":[["1","a"]]},
                {"stream":{},"values":[["2","b"]]}
            ]}}"#,
        );
        assert_eq!(events[0].1.host, "h1");
        assert_eq!(events[0].1.level.as_deref(), Some("warn"));
        assert_eq!(events[1].1.host, UNKNOWN_HOST);
    }

    #[test]
    fn entries_with_structured_metadata_are_accepted() {
        let events = parse(
            r#"{"data":{"result":[{"stream":{"host_name":"n1"},"values":[["1700000000000000000","x",{"trace_id":"abc"}]]}]}}"#,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 1_700_000_000_000_000_000);
        assert_eq!(events[0].1.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn malformed_entry_is_rejected() {
        let result: Result<QueryResponse, _> =
            serde_json::from_str(r#"{"data":{"result":[{"stream":{},"values":[[1,"x"]]}]}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_result_yields_no_events() {
        assert!(parse(r#"{"data":{"result":[]}}"#).is_empty());
    }
}
