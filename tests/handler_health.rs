mod common;

use axum::{Router, routing::get};
use axum_test::TestServer;
use request_gate::api::handlers::health_handler;

fn make_server() -> TestServer {
    let state = common::create_test_state(common::store(5));
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_endpoint_success() {
    let server = make_server();

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["user_store"]["status"], "ok");
    assert_eq!(json["checks"]["rate_limiter"]["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let server = make_server();

    let json = server.get("/health").await.json::<serde_json::Value>();

    assert!(json.get("version").is_some());
    assert_eq!(json["checks"]["user_store"]["message"], "Users: 0");
    assert_eq!(json["checks"]["rate_limiter"]["message"], "Tracked clients: 0");
}

#[tokio::test]
async fn test_health_through_full_stack_counts_clients() {
    let (app, sink) = common::create_test_app();
    let server = TestServer::new(app).unwrap();

    server.get("/health").await.assert_status_ok();
    let json = server.get("/health").await.json::<serde_json::Value>();

    assert_eq!(json["checks"]["rate_limiter"]["message"], "Tracked clients: 1");
    assert_eq!(sink.records().len(), 2);
    assert_eq!(sink.records()[0].path, "/health");
}
