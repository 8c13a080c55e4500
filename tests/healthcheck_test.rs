mod common;

use common::Harness;
use labwatch::app::router;
use labwatch::app::state::AppState;
use labwatch::healthcheck::HealthcheckError;
use std::net::TcpListener;
use std::time::Duration;
use tokio::time::sleep;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Healthcheck succeeds against the real router
#[tokio::test]
async fn test_healthcheck_succeeds_when_server_running() {
    let port = free_port();
    let harness = Harness::start();
    let app = router(AppState::new(harness.hub.clone(), harness.shutdown.clone()));

    let server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}"))
            .await
            .unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    sleep(Duration::from_millis(100)).await;

    let result = labwatch::healthcheck_with_port(port).await;
    assert!(result.is_ok(), "Healthcheck should succeed when server is running");

    server.abort();
}

#[tokio::test]
async fn test_healthcheck_fails_when_server_not_running() {
    let port = free_port();

    let result = labwatch::healthcheck_with_port(port).await;

    assert!(matches!(result, Err(HealthcheckError::Request(_))));
}

#[tokio::test]
async fn test_healthcheck_fails_on_non_success_status() {
    let port = free_port();

    let server = tokio::spawn(async move {
        let app = axum::Router::new().route(
            "/v1/health",
            axum::routing::get(|| async {
                (axum::http::StatusCode::SERVICE_UNAVAILABLE, "Unhealthy")
            }),
        );
        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}"))
            .await
            .unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    sleep(Duration::from_millis(100)).await;

    let result = labwatch::healthcheck_with_port(port).await;
    assert!(matches!(
        result,
        Err(HealthcheckError::Status(status)) if status.as_u16() == 503
    ));

    server.abort();
}
