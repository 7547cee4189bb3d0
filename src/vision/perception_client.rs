// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perception client over an OpenAI-compatible chat completions API

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::box_markup::parse_point_boxes;
use super::image_utils::to_data_uri;
use super::perception::{PerceptionError, PerceptionRequest, PerceptionResult, PerceptionService};
use crate::config::{PerceptionConfig, PerceptionProvider};

/// Longest slice of an error body kept in `PerceptionError::Status`
const MAX_ERROR_BODY: usize = 512;

const DETECTION_MAX_TOKENS: u32 = 2048;
const DETECTION_TEMPERATURE: f32 = 0.0;

// --- OpenAI-compatible serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for a perception model
pub struct PerceptionClient {
    client: Client,
    provider: PerceptionProvider,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PerceptionClient {
    /// Create a client from validated settings
    pub fn new(config: &PerceptionConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(
            "Perception client configured: provider={}, endpoint={}, model={}",
            config.provider, base_url, config.model
        );

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn provider(&self) -> PerceptionProvider {
        self.provider
    }

    /// Check that the service answers its model listing
    pub async fn health_check(&self) -> bool {
        match self
            .authorized(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Perception health check failed: {}", e);
                false
            }
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn classify(&self, e: reqwest::Error) -> PerceptionError {
        if e.is_timeout() {
            PerceptionError::Timeout(self.timeout)
        } else if e.is_connect() {
            PerceptionError::Unreachable(e.to_string())
        } else {
            PerceptionError::Transport(e.to_string())
        }
    }
}

fn build_chat_request(request: &PerceptionRequest) -> ChatRequest {
    let data_url = to_data_uri(&request.image, request.format);

    let mut messages = Vec::with_capacity(2);
    if let Some(hint) = request.output_kind.hint() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: serde_json::Value::String(hint.to_string()),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: serde_json::json!([
            {"type": "image_url", "image_url": {"url": data_url}},
            {"type": "text", "text": request.prompt}
        ]),
    });

    ChatRequest {
        model: request.model_id.clone(),
        messages,
        max_tokens: DETECTION_MAX_TOKENS,
        temperature: DETECTION_TEMPERATURE,
    }
}

fn into_result(response: ChatResponse, request: &PerceptionRequest) -> PerceptionResult {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content);

    let mut boxes = text.as_deref().map(parse_point_boxes).unwrap_or_default();
    if !request.allow_multiple {
        boxes.truncate(1);
    }

    PerceptionResult {
        model: response.model.unwrap_or_else(|| request.model_id.clone()),
        text,
        boxes,
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl PerceptionService for PerceptionClient {
    async fn call_perception(
        &self,
        request: PerceptionRequest,
    ) -> Result<PerceptionResult, PerceptionError> {
        let start = std::time::Instant::now();
        let body = build_chat_request(&request);

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/chat/completions", self.base_url)),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(PerceptionError::Status {
                status: status.as_u16(),
                body: truncate_body(&String::from_utf8_lossy(&bytes)),
            });
        }

        let chat_response: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|e| PerceptionError::InvalidResponse(e.to_string()))?;
        let result = into_result(chat_response, &request);

        info!(
            "Perception complete: {} boxes, {}ms (model: {})",
            result.boxes.len(),
            start.elapsed().as_millis(),
            result.model
        );

        Ok(result)
    }
}
