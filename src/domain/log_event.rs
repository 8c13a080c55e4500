use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One log line as read from Loki, forwarded verbatim to event subscribers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    /// Host that produced the line (`host_name` stream label).
    pub host: String,
    /// The raw log line.
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Stream labels attached by Loki, including those extracted by the query pipeline.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl LogEvent {
    pub fn new(host: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            msg: msg.into(),
            level: None,
            timestamp: Utc::now(),
            labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_field_names() {
        let event = LogEvent::new("n1", "boot");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["host"], "n1");
        assert_eq!(value["msg"], "boot");
        assert!(value.get("level").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn level_is_serialized_when_present() {
        let event = LogEvent::new("n2", "disk full").with_level("error");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["level"], "error");
    }
}
