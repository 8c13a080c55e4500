//! Producers feeding the merge loop.
//!
//! Each watcher is constructed up front (construction failures are startup
//! errors) and then driven by `watch`, which runs until the shutdown token is
//! cancelled or the watcher gives up. Either way its senders are dropped on
//! return, which the merge loop observes as a closed input.

pub mod error;
pub mod loki;
pub mod nodes;

pub use error::WatcherError;
pub use loki::{LokiConfig, LokiWatcher};
pub use nodes::{NodeWatcher, NodeWatcherConfig};
