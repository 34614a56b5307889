//! End-to-end scenarios from spec §8, driven through the Axum router with
//! `tower::ServiceExt::oneshot` (mirrors the teacher's
//! `transports/http/tests/test_validation.rs` per-crate `tests/` convention).

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use turnproxy_core::Registry;
use turnproxy_http::metrics::Metrics;
use turnproxy_http::router::build_router;
use turnproxy_http::state::AppState;
use turnproxy_http::HandlerError;

fn state_with_timeouts(handshake: Duration, turn: Duration) -> AppState {
    AppState {
        registry: Registry::new(10, handshake, turn),
        metrics: Metrics::new().unwrap(),
    }
}

async fn post_chat(router: &axum::Router, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn handshake_then_second_turn_exchanges_payloads() {
    let state = state_with_timeouts(Duration::from_millis(500), Duration::from_millis(500));
    let router = build_router(state, 1_048_576);

    let handshake = {
        let router = router.clone();
        tokio::spawn(async move {
            post_chat(
                &router,
                json!({"model": "s1", "messages": [{"role": "user", "content": "ping"}]}),
            )
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = tokio::spawn({
        let router = router.clone();
        async move {
            post_chat(
                &router,
                json!({"model": "s1", "messages": [{"role": "user", "content": "hello"}]}),
            )
            .await
        }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let third = post_chat(
        &router,
        json!({"model": "s1", "messages": [{"role": "user", "content": "reply-A"}]}),
    )
    .await;

    let (handshake_status, handshake_body) = handshake.await.unwrap();
    assert_eq!(handshake_status, StatusCode::OK);
    // Handshake content ("ping") is discarded; the first request's response
    // carries the second request's content, never its own.
    assert_eq!(handshake_body["choices"][0]["message"]["content"], "hello");

    let (second_status, _) = second.await.unwrap();
    assert_eq!(second_status, StatusCode::OK);

    assert_eq!(third.0, StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn explicit_sides_address_the_same_session() {
    let state = state_with_timeouts(Duration::from_millis(500), Duration::from_millis(500));
    let router = build_router(state, 1_048_576);

    let handshake = tokio::spawn({
        let router = router.clone();
        async move {
            post_chat(
                &router,
                json!({"model": "s2", "messages": [{"role": "user", "content": "ping"}]}),
            )
            .await
        }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let _ = post_chat(
        &router,
        json!({"model": "s2", "messages": [{"role": "user", "content": "hello"}]}),
    )
    .await;
    let _ = handshake.await.unwrap();

    let a = tokio::spawn({
        let router = router.clone();
        async move {
            post_chat(
                &router,
                json!({"model": "s2|A", "messages": [{"role": "user", "content": "msgA"}]}),
            )
            .await
        }
    });
    let b = tokio::spawn({
        let router = router.clone();
        async move {
            post_chat(
                &router,
                json!({"model": "s2|B", "messages": [{"role": "user", "content": "msgB"}]}),
            )
            .await
        }
    });

    let (a_status, a_body) = a.await.unwrap();
    let (b_status, b_body) = b.await.unwrap();

    assert_eq!(a_status, StatusCode::OK);
    assert_eq!(b_status, StatusCode::OK);
    assert_eq!(a_body["choices"][0]["message"]["content"], "msgB");
    assert_eq!(b_body["choices"][0]["message"]["content"], "msgA");
    // Both suffixes preserved verbatim in the echoed `model` field.
    assert_eq!(a_body["model"], "s2|A");
    assert_eq!(b_body["model"], "s2|B");
}

#[tokio::test]
async fn empty_messages_is_422_and_never_touches_the_registry() {
    let state = state_with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    let registry = state.registry.clone();
    let router = build_router(state, 1_048_576);

    let (status, body) = post_chat(&router, json!({"model": "s3", "messages": []})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn missing_model_is_422_with_error_envelope() {
    let state = state_with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    let router = build_router(state, 1_048_576);

    let (status, body) = post_chat(
        &router,
        json!({"messages": [{"role": "user", "content": "ping"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn message_missing_content_is_422_with_error_envelope() {
    let state = state_with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    let router = build_router(state, 1_048_576);

    let (status, body) = post_chat(
        &router,
        json!({"model": "s3b", "messages": [{"role": "user"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn malformed_json_body_is_422_with_error_envelope() {
    let state = state_with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    let router = build_router(state, 1_048_576);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from("{not valid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn capacity_exceeded_is_503() {
    let state = AppState {
        registry: Registry::new(0, Duration::from_millis(200), Duration::from_millis(200)),
        metrics: Metrics::new().unwrap(),
    };
    let router = build_router(state, 1_048_576);

    let (status, _) = post_chat(
        &router,
        json!({"model": "full", "messages": [{"role": "user", "content": "ping"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn lone_participant_times_out_with_408() {
    let state = state_with_timeouts(Duration::from_millis(30), Duration::from_millis(30));
    let router = build_router(state, 1_048_576);

    let (status, body) = post_chat(
        &router,
        json!({"model": "s4", "messages": [{"role": "user", "content": "ping"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"]["type"], "timeout_error");
}

#[tokio::test]
async fn admin_sessions_reflects_registry_and_ttl_eviction() {
    let state = state_with_timeouts(Duration::from_millis(30), Duration::from_millis(30));
    let registry = state.registry.clone();
    let router = build_router(state, 1_048_576);

    let _ = post_chat(
        &router,
        json!({"model": "stale", "messages": [{"role": "user", "content": "ping"}]}),
    )
    .await;
    assert_eq!(registry.count().await, 1);

    let evicted = registry.cleanup_expired(Duration::from_millis(10)).await;
    assert_eq!(evicted, 1);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/admin/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let sessions: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn handler_error_maps_every_core_error_to_a_status() {
    use turnproxy_core::Error as CoreError;
    let invalid_request: HandlerError = HandlerError::InvalidRequest("x".into());
    let capacity: HandlerError = CoreError::CapacityExceeded.into();
    let timeout: HandlerError = CoreError::Timeout.into();
    let closed: HandlerError = CoreError::Closed.into();

    assert!(matches!(invalid_request, HandlerError::InvalidRequest(_)));
    assert!(matches!(capacity, HandlerError::CapacityExceeded));
    assert!(matches!(timeout, HandlerError::Timeout));
    assert!(matches!(closed, HandlerError::Timeout));
}
