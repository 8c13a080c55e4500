use crate::app::state::AppState;
use crate::handler::events::events_handler;
use crate::handler::health::health_handler;
use crate::handler::index::index_handler;
use crate::handler::status::status_handler;
use axum::Router;
use axum::routing::get;

/// Build the HTTP router (dashboard, health, status and event streams).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/v1/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/events", get(events_handler))
        .with_state(state)
}
