// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perceive pipeline: decode, call the model, draw its boxes, encode
//!
//! Everything stays in memory. The upload is decoded once, the original
//! bytes go to the model untouched, and the annotated frame is re-encoded
//! as PNG for the response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::annotate::{draw_boxes_with_style, BoxStyle};
use super::geometry::{to_pixel_box, CoordinateSpace, PixelBox};
use super::image_utils::{decode_image_bytes, png_data_uri, ImageError};
use super::perception::{
    OutputKind, PerceptionError, PerceptionRequest, PerceptionResult, PerceptionService,
};
use crate::config::PerceptionConfig;

/// An uploaded file, owned by the request that carried it
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Pipeline output, ready for the JSON response
#[derive(Debug, Clone, PartialEq)]
pub struct PerceiveOutput {
    pub text: String,
    /// `data:image/png;base64,...`
    pub annotated_image: String,
    /// Boxes actually drawn, after normalization
    pub boxes: Vec<PixelBox>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid image: {0}")]
    InvalidImage(#[source] ImageError),

    #[error(transparent)]
    Perception(#[from] PerceptionError),

    #[error("failed to encode annotated image: {0}")]
    Encode(#[source] ImageError),
}

pub struct PerceptionPipeline {
    service: Arc<dyn PerceptionService>,
    model_id: String,
    coordinate_space: CoordinateSpace,
    timeout: Duration,
    style: BoxStyle,
}

impl PerceptionPipeline {
    pub fn new(service: Arc<dyn PerceptionService>, config: &PerceptionConfig) -> Self {
        Self {
            service,
            model_id: config.model.clone(),
            coordinate_space: config.coordinate_space,
            timeout: config.timeout,
            style: BoxStyle::default(),
        }
    }

    pub fn with_style(mut self, style: BoxStyle) -> Self {
        self.style = style;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Run one upload + prompt through the model and annotate the result
    ///
    /// Undecodable uploads fail before the model is called. Boxes the model
    /// reports without both corners are skipped; the rest are drawn.
    pub async fn handle(
        &self,
        upload: UploadedImage,
        prompt: &str,
    ) -> Result<PerceiveOutput, PipelineError> {
        let start = Instant::now();

        let (frame, info) =
            decode_image_bytes(&upload.bytes).map_err(PipelineError::InvalidImage)?;
        debug!(
            "Decoded upload '{}': {}x{} {:?}, {} bytes",
            upload.file_name, info.width, info.height, info.format, info.size_bytes
        );

        let request = PerceptionRequest {
            model_id: self.model_id.clone(),
            image: upload.bytes,
            format: info.format,
            prompt: prompt.to_string(),
            output_kind: OutputKind::Box,
            allow_multiple: true,
        };

        let result = tokio::time::timeout(self.timeout, self.service.call_perception(request))
            .await
            .map_err(|_| PerceptionError::Timeout(self.timeout))??;

        let boxes = self.pixel_boxes(&result, info.width, info.height);

        let mut annotated = frame;
        draw_boxes_with_style(&mut annotated, &boxes, self.style);
        let annotated_image = png_data_uri(&annotated).map_err(PipelineError::Encode)?;

        let text = match result.text {
            Some(ref text) => text.clone(),
            None => result.to_string(),
        };

        info!(
            "Perceive complete: {} of {} boxes drawn, {}ms",
            boxes.len(),
            result.boxes.len(),
            start.elapsed().as_millis()
        );

        Ok(PerceiveOutput {
            text,
            annotated_image,
            boxes,
        })
    }

    /// Normalize every reported box, skipping the malformed ones
    pub fn pixel_boxes(&self, result: &PerceptionResult, width: u32, height: u32) -> Vec<PixelBox> {
        result
            .boxes
            .iter()
            .enumerate()
            .filter_map(
                |(idx, detection)| match to_pixel_box(detection, self.coordinate_space, width, height) {
                    Ok(pixel_box) => Some(pixel_box),
                    Err(e) => {
                        warn!("Skipping box {} ({:?}): {}", idx, detection.mention, e);
                        None
                    }
                },
            )
            .collect()
    }
}
