// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::vision::{ImageError, PerceptionError, PipelineError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError {
        field: String,
        message: String,
    },
    InvalidImage {
        field: String,
        message: String,
    },
    PayloadTooLarge {
        size: Option<usize>,
        max: usize,
    },
    ServiceUnavailable(String),
    InternalError(String),
    Timeout,
}

fn field_details(field: &str) -> HashMap<String, serde_json::Value> {
    let mut details = HashMap::new();
    details.insert(
        "field".to_string(),
        serde_json::Value::String(field.to_string()),
    );
    details
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                ("validation_error", message.clone(), Some(field_details(field)))
            }
            ApiError::InvalidImage { field, message } => {
                ("invalid_image", message.clone(), Some(field_details(field)))
            }
            ApiError::PayloadTooLarge { size, max } => {
                let mut details = HashMap::new();
                details.insert("max".to_string(), serde_json::Value::Number((*max).into()));
                let message = match size {
                    Some(size) => {
                        details.insert("size".to_string(), serde_json::Value::Number((*size).into()));
                        format!("upload of {} bytes exceeds the {} byte limit", size, max)
                    }
                    None => format!("upload exceeds the {} byte limit", max),
                };
                ("payload_too_large", message, Some(details))
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
            ApiError::Timeout => ("timeout", "Request timed out".to_string(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidImage { .. } => 400,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
            ApiError::Timeout => 504,
        }
    }

    /// Attach a request id for the error body
    pub fn with_request_id(self, request_id: impl Into<String>) -> ApiErrorResponse {
        ApiErrorResponse {
            error: self,
            request_id: Some(request_id.into()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::InvalidImage { field, message } => {
                write!(f, "Invalid image in {}: {}", field, message)
            }
            ApiError::PayloadTooLarge { size: Some(size), max } => {
                write!(f, "Payload too large: {} bytes (max {})", size, max)
            }
            ApiError::PayloadTooLarge { size: None, max } => {
                write!(f, "Payload too large (max {})", max)
            }
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidImage(ImageError::TooLarge(size, max)) => {
                ApiError::PayloadTooLarge {
                    size: Some(size),
                    max,
                }
            }
            PipelineError::InvalidImage(e) => ApiError::InvalidImage {
                field: "file".to_string(),
                message: e.to_string(),
            },
            // Upstream detail goes to the log only
            PipelineError::Perception(e) => {
                warn!("Perception call failed: {}", e);
                match e {
                    PerceptionError::Timeout(_) => ApiError::Timeout,
                    _ => ApiError::ServiceUnavailable("Perception service unavailable".to_string()),
                }
            }
            PipelineError::Encode(e) => {
                warn!("Annotated image encoding failed: {}", e);
                ApiError::InternalError("Failed to encode annotated image".to_string())
            }
        }
    }
}

// Error response wrapper
#[derive(Debug)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub request_id: Option<String>,
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error_response = self.error.to_response(self.request_id);

        (status, Json(error_response)).into_response()
    }
}
