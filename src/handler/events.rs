use super::stream::pump;
use crate::app::state::AppState;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;
use tracing::error;

/// Handler for GET /events (WebSocket only): one log event per message.
pub async fn events_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        match state.hub.subscribe_events() {
            Ok(subscription) => pump(socket, subscription, state.shutdown).await,
            Err(e) => error!(error = %e, "Failed to register event subscriber"),
        }
    })
}
