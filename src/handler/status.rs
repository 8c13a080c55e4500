use super::stream::pump;
use crate::app::state::AppState;
use crate::domain::AggregatedStatus;
use axum::Json;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Handler for GET /status
///
/// A plain request gets the current snapshot as JSON. A WebSocket upgrade
/// gets the current snapshot as its first message, then every update.
pub async fn status_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(ws) = ws else {
        return Json(AggregatedStatus::clone(&state.hub.current())).into_response();
    };

    ws.on_upgrade(move |socket| async move {
        match state.hub.subscribe_status() {
            Ok(subscription) => pump(socket, subscription, state.shutdown).await,
            Err(e) => error!(error = %e, "Failed to register status subscriber"),
        }
    })
}
