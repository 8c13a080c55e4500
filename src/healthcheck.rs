use std::time::Duration;
use thiserror::Error;

/// Default listen port probed by the `healthcheck` subcommand
pub const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Error, Debug)]
pub enum HealthcheckError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Health endpoint returned status: {0}")]
    Status(reqwest::StatusCode),
}

/// Perform a health check against the default port
pub async fn healthcheck() -> Result<(), HealthcheckError> {
    healthcheck_with_port(DEFAULT_HTTP_PORT).await
}

/// Perform a health check against a local labwatch on `port`
pub async fn healthcheck_with_port(port: u16) -> Result<(), HealthcheckError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(HealthcheckError::Client)?;

    let resp = client
        .get(format!("http://127.0.0.1:{port}/v1/health"))
        .send()
        .await
        .map_err(HealthcheckError::Request)?;

    if resp.status().is_success() {
        Ok(())
    } else {
        Err(HealthcheckError::Status(resp.status()))
    }
}
