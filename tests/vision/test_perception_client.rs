// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Perception client tests against an in-process chat completions server
//!
//! Verifies the wire format sent to the model, the bearer token, and how
//! upstream failures are classified.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use fabstir_perceive_node::{
    config::{PerceptionConfig, PerceptionProvider},
    vision::{
        OutputKind, PerceptionClient, PerceptionError, PerceptionPipeline, PerceptionRequest,
        PerceptionService, UploadedImage,
    },
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CAT_MARKUP: &str = "<point_box mention=\"cat\"> (100,200) (500,700) </point_box>";

/// What the mock server saw on its last chat completions call
#[derive(Clone, Default)]
struct Captured {
    inner: Arc<Mutex<Option<(Option<String>, Value)>>>,
}

async fn chat_ok(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    *captured.inner.lock().unwrap() = Some((auth, body));

    Json(json!({
        "id": "chatcmpl-1",
        "model": "isaac-0.1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": CAT_MARKUP},
            "finish_reason": "stop"
        }]
    }))
}

/// Helper: Serve a router on an ephemeral port, returning its /v1 base URL
async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn config_for(base_url: &str, api_key: Option<&str>) -> PerceptionConfig {
    let provider = if api_key.is_some() {
        PerceptionProvider::Perceptron
    } else {
        PerceptionProvider::Local
    };
    let mut config = PerceptionConfig::for_provider(provider, api_key.map(|k| k.to_string()));
    config.base_url = base_url.to_string();
    config
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn box_request(image: Vec<u8>) -> PerceptionRequest {
    PerceptionRequest {
        model_id: "isaac-0.1".to_string(),
        image: Bytes::from(image),
        format: ImageFormat::Png,
        prompt: "find the cat".to_string(),
        output_kind: OutputKind::Box,
        allow_multiple: true,
    }
}

#[tokio::test]
async fn test_request_wire_format_and_auth() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_ok))
        .with_state(captured.clone());
    let base_url = spawn_mock(router).await;

    let client = PerceptionClient::new(&config_for(&base_url, Some("sk-test"))).unwrap();
    let result = client
        .call_perception(box_request(png_bytes(8, 8)))
        .await
        .unwrap();

    assert_eq!(result.model, "isaac-0.1");
    assert_eq!(result.text.as_deref(), Some(CAT_MARKUP));
    assert_eq!(result.boxes.len(), 1);
    assert_eq!(result.boxes[0].mention.as_deref(), Some("cat"));

    let (auth, body) = captured.inner.lock().unwrap().clone().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "isaac-0.1");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "<hint>BOX</hint>");
    assert_eq!(body["messages"][1]["role"], "user");

    let content = &body["messages"][1]["content"];
    let url = content[0]["image_url"]["url"].as_str().unwrap();
    assert!(url.starts_with("data:image/png;base64,"));
    assert_eq!(content[1]["text"], "find the cat");
}

#[tokio::test]
async fn test_local_provider_sends_no_auth() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_ok))
        .with_state(captured.clone());
    let base_url = spawn_mock(router).await;

    let client = PerceptionClient::new(&config_for(&base_url, None)).unwrap();
    client
        .call_perception(box_request(png_bytes(4, 4)))
        .await
        .unwrap();

    let (auth, _) = captured.inner.lock().unwrap().clone().unwrap();
    assert!(auth.is_none());
}

#[tokio::test]
async fn test_upstream_error_status() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let base_url = spawn_mock(router).await;

    let client = PerceptionClient::new(&config_for(&base_url, None)).unwrap();
    let err = client
        .call_perception(box_request(png_bytes(4, 4)))
        .await
        .unwrap_err();

    match err {
        PerceptionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_json_response() {
    let router = Router::new().route("/v1/chat/completions", post(|| async { "not json" }));
    let base_url = spawn_mock(router).await;

    let client = PerceptionClient::new(&config_for(&base_url, None)).unwrap();
    let err = client
        .call_perception(box_request(png_bytes(4, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, PerceptionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let base_url = spawn_mock(router).await;

    let mut config = config_for(&base_url, None);
    config.timeout = Duration::from_millis(200);
    let client = PerceptionClient::new(&config).unwrap();
    let err = client
        .call_perception(box_request(png_bytes(4, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, PerceptionError::Timeout(_)));
}

#[tokio::test]
async fn test_health_check_against_models_endpoint() {
    let router = Router::new().route(
        "/v1/models",
        get(|| async { Json(json!({"data": [{"id": "isaac-0.1"}]})) }),
    );
    let base_url = spawn_mock(router).await;

    let client = PerceptionClient::new(&config_for(&base_url, None)).unwrap();
    assert!(client.health_check().await);
}

/// Full pipeline through the real client: grid boxes become pixel boxes
#[tokio::test]
async fn test_pipeline_with_http_client() {
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_ok))
        .with_state(Captured::default());
    let base_url = spawn_mock(router).await;

    let config = config_for(&base_url, None);
    let client = PerceptionClient::new(&config).unwrap();
    let pipeline = PerceptionPipeline::new(Arc::new(client), &config);

    let upload = UploadedImage {
        file_name: "cat.png".to_string(),
        bytes: Bytes::from(png_bytes(800, 600)),
    };
    let output = pipeline.handle(upload, "find the cat").await.unwrap();

    assert_eq!(output.text, CAT_MARKUP);
    assert_eq!(output.boxes.len(), 1);
    let b = output.boxes[0];
    assert!((b.x1 - 80.0).abs() < 1e-9);
    assert!((b.y1 - 120.0).abs() < 1e-9);
    assert!((b.x2 - 400.0).abs() < 1e-9);
    assert!((b.y2 - 420.0).abs() < 1e-9);
    assert!(output.annotated_image.starts_with("data:image/png;base64,"));
}
