use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::LabwatchError;
use crate::watcher::{LokiConfig, NodeWatcherConfig};

/// Runtime settings, read from an optional YAML file. Every key has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Settings {
    /// Loki host:port or URL; `http://` is assumed when no scheme is given
    pub loki_address: String,
    pub loki_query: String,
    pub talos_cluster: String,
    /// Node name -> health probe URL
    pub nodes: BTreeMap<String, String>,
    pub listen_port: u16,
    pub poll_interval_ms: u64,
    pub stats_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            loki_address: "boss.local:3100".to_string(),
            loki_query: r#"{ host_name =~ ".+" } | json"#.to_string(),
            talos_cluster: "koobs".to_string(),
            nodes: BTreeMap::new(),
            listen_port: 8080,
            poll_interval_ms: 1000,
            stats_interval_ms: 5000,
        }
    }
}

impl Settings {
    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<(), LabwatchError> {
        validate_not_empty("loki-address", &self.loki_address)?;
        validate_not_empty("loki-query", &self.loki_query)?;
        validate_not_empty("talos-cluster", &self.talos_cluster)?;
        validate_port(self.listen_port)?;
        validate_interval("poll-interval-ms", self.poll_interval_ms)?;
        validate_interval("stats-interval-ms", self.stats_interval_ms)?;
        Ok(())
    }

    /// Loki base URL with a scheme and without a trailing slash.
    pub fn loki_url(&self) -> String {
        let address = self.loki_address.trim().trim_end_matches('/');
        if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }

    pub fn loki_config(&self) -> LokiConfig {
        LokiConfig {
            address: self.loki_url(),
            query: self.loki_query.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stats_interval: Duration::from_millis(self.stats_interval_ms),
            ..LokiConfig::default()
        }
    }

    pub fn node_config(&self) -> NodeWatcherConfig {
        NodeWatcherConfig {
            cluster: self.talos_cluster.clone(),
            nodes: self.nodes.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

fn validate_not_empty(key: &str, value: &str) -> Result<(), LabwatchError> {
    if value.trim().is_empty() {
        return Err(LabwatchError::Config(format!("{key} cannot be empty")));
    }
    Ok(())
}

fn validate_port(port: u16) -> Result<(), LabwatchError> {
    if port == 0 {
        return Err(LabwatchError::Config("Port cannot be 0".into()));
    }
    Ok(())
}

fn validate_interval(key: &str, millis: u64) -> Result<(), LabwatchError> {
    if millis == 0 {
        return Err(LabwatchError::Config(format!("{key} must be greater than 0")));
    }
    Ok(())
}

/// Load settings from `path`, or defaults when no file is given, and validate them.
pub fn get_configuration(path: Option<&Path>) -> Result<Settings, LabwatchError> {
    let settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| {
                LabwatchError::Config(format!("Failed to read {}: {e}", path.display()))
            })?;
            parse_settings(&raw)?
        }
        None => Settings::default(),
    };

    settings.validate()?;

    Ok(settings)
}

fn parse_settings(raw: &str) -> Result<Settings, LabwatchError> {
    // An empty document means "all defaults".
    if raw.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(raw)
        .map_err(|e| LabwatchError::Config(format!("Failed to parse config file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_port_zero_fails() {
        let err = validate_port(0).unwrap_err();
        assert!(err.to_string().contains("Port cannot be 0"));
    }

    #[test]
    fn test_validate_port_valid() {
        assert!(validate_port(1).is_ok());
        assert!(validate_port(8080).is_ok());
        assert!(validate_port(65535).is_ok());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_empty_query_fails() {
        let settings = Settings {
            loki_query: "  ".into(),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("loki-query"));
    }

    #[test]
    fn test_zero_interval_fails() {
        let settings = Settings {
            stats_interval_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_loki_url_adds_scheme() {
        let settings = Settings::default();
        assert_eq!(settings.loki_url(), "http://boss.local:3100");

        let settings = Settings {
            loki_address: "https://loki.lab/".into(),
            ..Settings::default()
        };
        assert_eq!(settings.loki_url(), "https://loki.lab");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = parse_settings(
            "loki-address: loki.lab:3100\nnodes:\n  n1: http://10.0.0.11:8080/healthz\n",
        )
        .unwrap();

        assert_eq!(settings.loki_address, "loki.lab:3100");
        assert_eq!(settings.talos_cluster, "koobs");
        assert_eq!(settings.listen_port, 8080);
        assert_eq!(
            settings.nodes.get("n1").map(String::as_str),
            Some("http://10.0.0.11:8080/healthz")
        );
    }

    #[test]
    fn test_unknown_key_fails() {
        assert!(parse_settings("loki-adress: typo:3100\n").is_err());
    }

    #[test]
    fn test_get_configuration_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen-port: 9000\ntalos-cluster: lab").unwrap();

        let settings = get_configuration(Some(file.path())).unwrap();
        assert_eq!(settings.listen_port, 9000);
        assert_eq!(settings.talos_cluster, "lab");
    }

    #[test]
    fn test_get_configuration_missing_file_fails() {
        let err = get_configuration(Some(Path::new("/nonexistent/labwatch.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_get_configuration_without_file_uses_defaults() {
        assert_eq!(get_configuration(None).unwrap(), Settings::default());
    }
}
