// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perceive endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::request::PerceiveForm;
use super::response::PerceiveResponse;
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;

/// POST /perceive - Detect what the prompt asks for and draw it on the image
///
/// # Request (multipart/form-data)
/// - `prompt`: Text prompt (required, non-empty)
/// - `file`: Image file (required; PNG, JPEG, WebP, GIF, BMP or TIFF)
///
/// # Response
/// - `text`: Model text output
/// - `annotated_image`: `data:image/png;base64,...` with detected boxes drawn
///
/// # Errors
/// - 400 Bad Request: Missing/empty field or undecodable image
/// - 413 Payload Too Large: Image over the upload ceiling
/// - 503 Service Unavailable: Perception service unreachable or failing
/// - 504 Gateway Timeout: Perception service did not answer in time
pub async fn perceive_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PerceiveResponse>, ApiErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("perceive", request_id = %request_id);

    async move {
        let max_upload_bytes = state.max_upload_bytes;
        let request = PerceiveForm::from_multipart(multipart, max_upload_bytes)
            .await
            .and_then(|form| form.validate(max_upload_bytes))
            .map_err(|e| {
                warn!("Perceive validation failed: {}", e);
                e.with_request_id(request_id.as_str())
            })?;

        debug!(
            "Perceive request: file='{}', {} bytes, prompt {} chars",
            request.upload.file_name,
            request.upload.bytes.len(),
            request.prompt.chars().count()
        );

        let output = state
            .pipeline
            .handle(request.upload, &request.prompt)
            .await
            .map_err(|e| ApiError::from(e).with_request_id(request_id.as_str()))?;

        Ok::<_, ApiErrorResponse>(Json(PerceiveResponse::from(output)))
    }
    .instrument(span)
    .await
}
