// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Box geometry: model coordinate spaces and conversion to pixel space
//!
//! Perception models report boxes in their own coordinate convention. The
//! Isaac family answers on a fixed 1000-unit grid, other models use 0-1
//! fractions. [`to_pixel_box`] maps either onto the pixel grid of the image
//! that was uploaded, one axis at a time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid extent used by the Perceptron Isaac models
pub const PERCEPTRON_GRID: u32 = 1000;

/// Coordinate convention of a perception model's box output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Fractions of the image size, 0.0 - 1.0 on both axes
    Fractional,
    /// Integer grid, 0 - n on both axes
    Grid(u32),
}

impl CoordinateSpace {
    /// Extent of the space on each axis
    pub fn extent(&self) -> f64 {
        match self {
            CoordinateSpace::Fractional => 1.0,
            CoordinateSpace::Grid(n) => *n as f64,
        }
    }
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        CoordinateSpace::Grid(PERCEPTRON_GRID)
    }
}

impl fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSpace::Fractional => write!(f, "fractional"),
            CoordinateSpace::Grid(n) => write!(f, "grid:{}", n),
        }
    }
}

impl FromStr for CoordinateSpace {
    type Err = String;

    /// Parses `fractional` or `grid:<n>` (e.g. `grid:1000`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "fractional" {
            return Ok(CoordinateSpace::Fractional);
        }
        if let Some(n) = s.strip_prefix("grid:") {
            let n = n
                .parse::<u32>()
                .map_err(|_| format!("invalid grid size in '{}'", s))?;
            if n == 0 {
                return Err("grid size must be > 0".to_string());
            }
            return Ok(CoordinateSpace::Grid(n));
        }
        Err(format!(
            "unknown coordinate space '{}'; expected 'fractional' or 'grid:<n>'",
            s
        ))
    }
}

/// A point in the model's coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacePoint {
    pub x: f64,
    pub y: f64,
}

impl SpacePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A box as reported by the perception model
///
/// Corners are optional because the model output is untrusted: a box tag
/// may arrive with one coordinate pair or none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    /// What the model says the box contains, if it said anything
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
    pub top_left: Option<SpacePoint>,
    pub bottom_right: Option<SpacePoint>,
}

impl DetectionBox {
    pub fn new(top_left: SpacePoint, bottom_right: SpacePoint) -> Self {
        Self {
            mention: None,
            top_left: Some(top_left),
            bottom_right: Some(bottom_right),
        }
    }

    pub fn with_mention(mut self, mention: impl Into<String>) -> Self {
        self.mention = Some(mention.into());
        self
    }
}

/// A box in absolute pixel coordinates of a specific image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl PixelBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// Reasons a reported box cannot be placed on the image
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedBoxError {
    #[error("box is missing its {0} corner")]
    MissingCorner(&'static str),

    #[error("box has a non-finite coordinate")]
    NonFinite,

    #[error("target image has no area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Convert a model-reported box to pixel coordinates of a `width` x `height` image
///
/// Scale factor is `dimension / space extent`, applied per axis. Results
/// outside the image are clipped to `[0, width] x [0, height]`, and corners
/// reported in reverse order are swapped so `x1 <= x2` and `y1 <= y2`.
pub fn to_pixel_box(
    detection: &DetectionBox,
    space: CoordinateSpace,
    width: u32,
    height: u32,
) -> Result<PixelBox, MalformedBoxError> {
    if width == 0 || height == 0 {
        return Err(MalformedBoxError::EmptyImage { width, height });
    }

    let top_left = detection
        .top_left
        .ok_or(MalformedBoxError::MissingCorner("top-left"))?;
    let bottom_right = detection
        .bottom_right
        .ok_or(MalformedBoxError::MissingCorner("bottom-right"))?;

    let coords = [top_left.x, top_left.y, bottom_right.x, bottom_right.y];
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(MalformedBoxError::NonFinite);
    }

    let (w, h) = (width as f64, height as f64);
    let sx = w / space.extent();
    let sy = h / space.extent();

    let xa = (top_left.x * sx).clamp(0.0, w);
    let ya = (top_left.y * sy).clamp(0.0, h);
    let xb = (bottom_right.x * sx).clamp(0.0, w);
    let yb = (bottom_right.y * sy).clamp(0.0, h);

    Ok(PixelBox {
        x1: xa.min(xb),
        y1: ya.min(yb),
        x2: xa.max(xb),
        y2: ya.max(yb),
    })
}
