//! Integration tests for the speech streaming server

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::*;

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_healthz_alias() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_nested_api_prefix() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_voices() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/voices").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let voices: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(voices, vec!["af_bella"]);
}

#[tokio::test]
async fn test_text_endpoint_returns_complete_wav() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json("/text", json!({ "text": "Hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/wav"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // 250 samples from the mock engine, two bytes each, plus the header
    assert_eq!(body.len(), 44 + 500);
    assert_eq!(&body[0..4], b"RIFF");
    assert_eq!(u32_at(&body, 4), 36 + 500);
    assert_eq!(u32_at(&body, 40), 500);
}

#[tokio::test]
async fn test_text_endpoint_validation_empty_text() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json("/text", json!({ "text": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].is_string());
}

#[tokio::test]
async fn test_text_endpoint_validation_long_text() {
    let app = create_test_app();
    let long_text = "a".repeat(6000); // Exceeds 5000 char limit
    let response = app
        .oneshot(post_json("/text", json!({ "text": long_text })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_endpoint_validation_bad_speed() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json("/text", json!({ "text": "Hello", "speed": -1.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_endpoint_validation_bad_voice() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json("/text", json!({ "text": "Hello", "voice": "NOT A VOICE" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_endpoint_engine_failure_is_500() {
    let app = create_test_app_with(MockEngine::failing_after(vec![vec![0.5; 100]]));
    let response = app
        .oneshot(post_json("/text", json!({ "text": "Hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_stream_pcm_yields_header_then_samples() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json(
            "/stream/pcm",
            json!({ "text": "Hello", "voice": "af_bella", "speed": 1.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/wav"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // 44-byte unbounded header followed by exactly 500 bytes of PCM
    assert_eq!(body.len(), 44 + 500);
    assert_eq!(&body[0..4], b"RIFF");
    assert_eq!(u32_at(&body, 4), u32::MAX);
    assert_eq!(u32_at(&body, 40), u32::MAX - 36);
}

#[tokio::test]
async fn test_stream_mp3_content_type_and_sync_word() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json("/stream", json!({ "text": "Hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/mpeg"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!body.is_empty());
    assert_eq!(body[0], 0xFF);
    assert_eq!(body[1] & 0xE0, 0xE0);
}

#[tokio::test]
async fn test_stream_pcm_engine_failure_truncates_body() {
    let app = create_test_app_with(MockEngine::failing_after(vec![vec![0.5; 100]]));
    let response = app
        .oneshot(post_json("/stream/pcm", json!({ "text": "Hello" })))
        .await
        .unwrap();

    // Headers are already on the wire when the engine dies; the body errors
    // out instead of ending cleanly.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn test_stream_validation_rejects_before_streaming() {
    let app = create_test_app();
    let response = app
        .oneshot(post_json("/stream", json!({ "text": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(metrics["system"]["uptime_seconds"].is_number());
    assert!(metrics["endpoints"]["text"]["request_count"].is_number());
    assert!(metrics["endpoints"]["stream_mp3"]["bytes_out"].is_number());
}

#[tokio::test]
async fn test_not_found_endpoint() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
