// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for the perceive endpoint
//!
//! This module provides:
//! - Upload decoding and PNG/data URI encoding
//! - Conversion of model-reported boxes to pixel space
//! - Box overlay drawing
//! - The remote perception client and the pipeline tying it all together

pub mod annotate;
pub mod box_markup;
pub mod geometry;
pub mod image_utils;
pub mod perception;
pub mod perception_client;
pub mod pipeline;

pub use annotate::{annotate, draw_boxes, BoxStyle, STROKE_COLOR, STROKE_WIDTH};
pub use geometry::{to_pixel_box, CoordinateSpace, DetectionBox, MalformedBoxError, PixelBox, SpacePoint};
pub use image_utils::{decode_image_bytes, detect_format, png_data_uri, ImageError, ImageInfo};
pub use perception::{
    OutputKind, PerceptionError, PerceptionRequest, PerceptionResult, PerceptionService,
};
pub use perception_client::PerceptionClient;
pub use pipeline::{PerceiveOutput, PerceptionPipeline, PipelineError, UploadedImage};
