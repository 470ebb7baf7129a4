use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose, Engine as _};
use serial_test::serial;
use tower::ServiceExt;

mod common;

#[tokio::test]
#[serial]
async fn metrics_requires_basic_auth() {
    let test_app = common::create_test_app();

    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn metrics_renders_with_valid_credentials() {
    std::env::set_var("METRICS_AUTH", "admin:test-secret");
    let test_app = common::create_test_app();

    // Drive one request through the middleware so the counters are warm.
    let (status, _) = common::get(&test_app.app, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let credentials = general_purpose::STANDARD.encode("admin:test-secret");
    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));

    std::env::remove_var("METRICS_AUTH");
}

#[tokio::test]
#[serial]
async fn wrong_credentials_are_rejected() {
    std::env::set_var("METRICS_AUTH", "admin:test-secret");
    let test_app = common::create_test_app();

    let credentials = general_purpose::STANDARD.encode("admin:wrong");
    let response = test_app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    std::env::remove_var("METRICS_AUTH");
}
