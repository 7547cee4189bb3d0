// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perceive request parsing and validation

use axum::http::StatusCode;
use axum_extra::extract::multipart::MultipartError;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::UploadedImage;

/// Name of the prompt form field
pub const PROMPT_FIELD: &str = "prompt";

/// Name of the image form field
pub const FILE_FIELD: &str = "file";

/// Maximum prompt length in characters
const MAX_PROMPT_CHARS: usize = 4096;

/// Filename used when the client sends none
const DEFAULT_FILE_NAME: &str = "upload";

/// Raw multipart form, before validation
#[derive(Debug, Clone, Default)]
pub struct PerceiveForm {
    pub prompt: Option<String>,
    pub file_name: Option<String>,
    pub file: Option<Bytes>,
}

/// Validated perceive request
#[derive(Debug, Clone)]
pub struct PerceiveRequest {
    pub prompt: String,
    pub upload: UploadedImage,
}

fn multipart_error(err: MultipartError, field: Option<&str>, max_upload_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge {
            size: None,
            max: max_upload_bytes,
        };
    }
    match field {
        Some(field) => ApiError::ValidationError {
            field: field.to_string(),
            message: format!("failed to read {}: {}", field, err.body_text()),
        },
        None => ApiError::InvalidRequest(format!("malformed multipart body: {}", err.body_text())),
    }
}

impl PerceiveForm {
    /// Collect the `prompt` and `file` parts; other parts are ignored
    pub async fn from_multipart(
        mut multipart: Multipart,
        max_upload_bytes: usize,
    ) -> Result<Self, ApiError> {
        let mut form = PerceiveForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, None, max_upload_bytes))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                PROMPT_FIELD => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, Some(PROMPT_FIELD), max_upload_bytes))?;
                    form.prompt = Some(text);
                }
                FILE_FIELD => {
                    form.file_name = field.file_name().map(|s| s.to_string());
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, Some(FILE_FIELD), max_upload_bytes))?;
                    form.file = Some(bytes);
                }
                other => {
                    debug!("Ignoring unexpected multipart field '{}'", other);
                }
            }
        }

        Ok(form)
    }

    /// Validate the form against the upload ceiling
    pub fn validate(self, max_upload_bytes: usize) -> Result<PerceiveRequest, ApiError> {
        let prompt = match self.prompt {
            Some(p) if !p.trim().is_empty() => p,
            _ => {
                return Err(ApiError::ValidationError {
                    field: PROMPT_FIELD.to_string(),
                    message: "prompt is required".to_string(),
                })
            }
        };

        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(ApiError::ValidationError {
                field: PROMPT_FIELD.to_string(),
                message: format!("prompt exceeds maximum length of {} characters", MAX_PROMPT_CHARS),
            });
        }

        let bytes = match self.file {
            Some(b) if !b.is_empty() => b,
            Some(_) => {
                return Err(ApiError::ValidationError {
                    field: FILE_FIELD.to_string(),
                    message: "file is empty".to_string(),
                })
            }
            None => {
                return Err(ApiError::ValidationError {
                    field: FILE_FIELD.to_string(),
                    message: "file is required".to_string(),
                })
            }
        };

        if bytes.len() > max_upload_bytes {
            return Err(ApiError::PayloadTooLarge {
                size: Some(bytes.len()),
                max: max_upload_bytes,
            });
        }

        let file_name = self
            .file_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        Ok(PerceiveRequest {
            prompt,
            upload: UploadedImage { file_name, bytes },
        })
    }
}
