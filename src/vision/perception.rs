// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Perception service contract
//!
//! The pipeline only talks to the remote model through [`PerceptionService`],
//! so the HTTP client can be swapped for a stub in tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use thiserror::Error;

use super::geometry::DetectionBox;

/// Kind of structured output requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Bounding boxes around what the prompt asks for
    Box,
    /// Free text only
    Text,
}

impl OutputKind {
    /// Hint placed in the system message, if the kind needs one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            OutputKind::Box => Some("<hint>BOX</hint>"),
            OutputKind::Text => None,
        }
    }
}

/// One call to the remote model
#[derive(Debug, Clone)]
pub struct PerceptionRequest {
    pub model_id: String,
    /// Original upload bytes, forwarded as-is
    pub image: Bytes,
    pub format: ImageFormat,
    pub prompt: String,
    pub output_kind: OutputKind,
    pub allow_multiple: bool,
}

/// What the model answered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerceptionResult {
    /// Model that produced the answer
    pub model: String,
    /// Free text output, absent when the response carried none
    pub text: Option<String>,
    pub boxes: Vec<DetectionBox>,
}

impl fmt::Display for PerceptionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PerceptionResult(model={}, boxes=[", self.model)?;
        for (idx, b) in self.boxes.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            let label = b.mention.as_deref().unwrap_or("?");
            match (b.top_left, b.bottom_right) {
                (Some(tl), Some(br)) => write!(
                    f,
                    "{} ({}, {}) ({}, {})",
                    label, tl.x, tl.y, br.x, br.y
                )?,
                _ => write!(f, "{} (incomplete)", label)?,
            }
        }
        write!(f, "])")
    }
}

/// Failures of the remote perception call
#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("perception service unreachable: {0}")]
    Unreachable(String),

    #[error("perception service timed out after {0:?}")]
    Timeout(Duration),

    #[error("perception service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from perception service: {0}")]
    InvalidResponse(String),

    #[error("perception request failed: {0}")]
    Transport(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PerceptionService: Send + Sync {
    /// Run the model on one image + prompt
    async fn call_perception(
        &self,
        request: PerceptionRequest,
    ) -> Result<PerceptionResult, PerceptionError>;
}
