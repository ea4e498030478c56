mod common;

use axum::http::StatusCode;

use common::{build_test_app, get, send};

#[tokio::test]
async fn health_needs_no_key() {
    let (app, _store) = build_test_app();

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_healthy"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_reports_degraded_storage() {
    let (app, store) = build_test_app();
    store.set_unavailable(true);

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["db_healthy"], false);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (app, _store) = build_test_app();
    let response = tower::ServiceExt::oneshot(app, get("/health", None)).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
