use crate::fanout::Hub;
use tokio_util::sync::CancellationToken;

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    /// Cancelled on shutdown; open WebSocket streams close when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(hub: Hub, shutdown: CancellationToken) -> Self {
        Self { hub, shutdown }
    }
}
