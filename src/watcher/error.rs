use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Invalid watcher configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Backend at {address} is not reachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("Gave up after {failures} consecutive failed polls: {last_error}")]
    GaveUp { failures: u32, last_error: String },
}
