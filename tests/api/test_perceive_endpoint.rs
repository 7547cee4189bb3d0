// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /perceive endpoint tests
//!
//! These tests drive the full router with a stub perception service and verify:
//! - A detected box is drawn at the normalized pixel position
//! - Empty model output still yields a non-empty text and an unchanged image
//! - An unreachable perception service maps to 503
//! - Non-image uploads are rejected before any remote call
//! - Missing fields, oversized uploads and wrong methods are rejected

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fabstir_perceive_node::{
    api::http_server::{create_app, AppState},
    config::{PerceptionConfig, PerceptionProvider, ServerConfig},
    vision::{
        geometry::{DetectionBox, SpacePoint},
        PerceptionClient, PerceptionError, PerceptionPipeline, PerceptionRequest,
        PerceptionResult, PerceptionService,
    },
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "perceive-test-boundary";
const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
const LIME: Rgb<u8> = Rgb([0, 255, 0]);

/// Stub that replays one canned result and counts calls
struct StubService {
    calls: Arc<AtomicUsize>,
    text: Option<String>,
    boxes: Vec<DetectionBox>,
}

#[async_trait]
impl PerceptionService for StubService {
    async fn call_perception(
        &self,
        request: PerceptionRequest,
    ) -> Result<PerceptionResult, PerceptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PerceptionResult {
            model: request.model_id,
            text: self.text.clone(),
            boxes: self.boxes.clone(),
        })
    }
}

fn perception_config() -> PerceptionConfig {
    PerceptionConfig::for_provider(PerceptionProvider::Local, None)
}

fn app_with_service(service: Arc<dyn PerceptionService>, server: &ServerConfig) -> Router {
    let pipeline = PerceptionPipeline::new(service, &perception_config());
    create_app(AppState::new(pipeline, server), server)
}

fn stub_app(text: Option<&str>, boxes: Vec<DetectionBox>) -> (Router, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = StubService {
        calls: calls.clone(),
        text: text.map(|t| t.to_string()),
        boxes,
    };
    (
        app_with_service(Arc::new(service), &ServerConfig::default()),
        calls,
    )
}

fn gray_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, GRAY);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// Helper: Build a multipart/form-data body by hand
fn multipart_body(prompt: Option<&str>, file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(prompt) = prompt {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\n{}\r\n",
                BOUNDARY, prompt
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn perceive_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/perceive")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn decode_annotated(data_uri: &str) -> RgbImage {
    let encoded = data_uri
        .strip_prefix("data:image/png;base64,")
        .expect("annotated image must be a PNG data URI");
    let bytes = STANDARD.decode(encoded).unwrap();
    image::load_from_memory(&bytes).unwrap().to_rgb8()
}

#[cfg(test)]
mod perceive_endpoint_tests {
    use super::*;

    /// One box on the 1000-unit grid lands at its scaled pixel position
    #[tokio::test]
    async fn test_single_box_is_drawn_at_pixel_position() {
        let markup = "<point_box mention=\"cat\"> (100,200) (500,700) </point_box>";
        let cat = DetectionBox::new(SpacePoint::new(100.0, 200.0), SpacePoint::new(500.0, 700.0))
            .with_mention("cat");
        let (app, calls) = stub_app(Some(markup), vec![cat]);

        let png = gray_png(800, 600);
        let body = multipart_body(Some("find the cat"), Some(("cat.png", "image/png", png.as_slice())));
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let json = json_body(response).await;
        assert_eq!(json["text"], markup);

        let annotated = decode_annotated(json["annotated_image"].as_str().unwrap());
        assert_eq!(annotated.dimensions(), (800, 600));

        // Box spans (80,120)-(400,420)
        assert_eq!(*annotated.get_pixel(80, 270), LIME);
        assert_eq!(*annotated.get_pixel(400, 270), LIME);
        assert_eq!(*annotated.get_pixel(240, 120), LIME);
        assert_eq!(*annotated.get_pixel(240, 420), LIME);
        assert_eq!(*annotated.get_pixel(240, 270), GRAY);
        assert_eq!(*annotated.get_pixel(10, 10), GRAY);
    }

    /// No text and no boxes: text falls back to a summary, image is unchanged
    #[tokio::test]
    async fn test_empty_result_returns_summary_and_untouched_image() {
        let (app, _) = stub_app(None, vec![]);

        let png = gray_png(64, 48);
        let body = multipart_body(Some("find the dog"), Some(("empty.png", "image/png", png.as_slice())));
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;

        let text = json["text"].as_str().unwrap();
        assert!(!text.is_empty());
        assert!(text.contains("isaac-0.1"));

        let annotated = decode_annotated(json["annotated_image"].as_str().unwrap());
        assert_eq!(annotated.dimensions(), (64, 48));
        assert!(annotated.pixels().all(|p| *p == GRAY));
    }

    /// Success body carries exactly `text` and `annotated_image`
    #[tokio::test]
    async fn test_success_body_has_two_fields() {
        let (app, _) = stub_app(Some("nothing here"), vec![]);

        let png = gray_png(16, 16);
        let body = multipart_body(Some("anything"), Some(("a.png", "image/png", png.as_slice())));
        let json = json_body(app.oneshot(perceive_request(body)).await.unwrap()).await;

        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("text"));
        assert!(obj.contains_key("annotated_image"));
    }

    /// Unreachable perception service maps to 503 without leaking upstream detail
    #[tokio::test]
    async fn test_unreachable_service_returns_503() {
        let mut config = perception_config();
        config.base_url = "http://127.0.0.1:59999/v1".to_string();
        let client = PerceptionClient::new(&config).unwrap();
        let app = app_with_service(Arc::new(client), &ServerConfig::default());

        let png = gray_png(32, 32);
        let body = multipart_body(Some("find the cat"), Some(("cat.png", "image/png", png.as_slice())));
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "service_unavailable");
        assert!(!json["message"].as_str().unwrap().contains("59999"));
        assert!(json["request_id"].is_string());
    }

    /// A text file is rejected before the model is called
    #[tokio::test]
    async fn test_non_image_upload_rejected_without_remote_call() {
        let (app, calls) = stub_app(Some("unused"), vec![]);

        let body = multipart_body(
            Some("find the cat"),
            Some(("notes.txt", "text/plain", &b"just some notes, not an image"[..])),
        );
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let json = json_body(response).await;
        assert_eq!(json["error_type"], "invalid_image");
        assert_eq!(json["details"]["field"], "file");
    }

    #[tokio::test]
    async fn test_missing_prompt_rejected() {
        let (app, calls) = stub_app(Some("unused"), vec![]);

        let png = gray_png(8, 8);
        let body = multipart_body(None, Some(("a.png", "image/png", png.as_slice())));
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "validation_error");
        assert_eq!(json["details"]["field"], "prompt");
    }

    #[tokio::test]
    async fn test_missing_file_rejected() {
        let (app, _) = stub_app(Some("unused"), vec![]);

        let body = multipart_body(Some("find the cat"), None);
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["details"]["field"], "file");
    }

    #[tokio::test]
    async fn test_upload_over_ceiling_returns_413() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = StubService {
            calls: calls.clone(),
            text: None,
            boxes: vec![],
        };
        let server = ServerConfig {
            max_upload_bytes: 1024,
            ..Default::default()
        };
        let app = app_with_service(Arc::new(service), &server);

        let png = vec![0u8; 4096];
        let body = multipart_body(Some("find the cat"), Some(("big.png", "image/png", png.as_slice())));
        let response = app.oneshot(perceive_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "payload_too_large");
        assert_eq!(json["details"]["max"], 1024);
    }

    #[tokio::test]
    async fn test_get_not_allowed() {
        let (app, _) = stub_app(None, vec![]);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/perceive")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_route_not_found() {
        let (app, _) = stub_app(None, vec![]);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// CORS preflight from the configured frontend origin is allowed
    #[tokio::test]
    async fn test_cors_preflight_from_frontend_origin() {
        let (app, _) = stub_app(None, vec![]);

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/perceive")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:3000"
        );
    }
}
