// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Box overlay drawing

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::geometry::PixelBox;

/// Outline thickness in pixels, drawn inward from the box edge
pub const STROKE_WIDTH: u32 = 3;

/// Outline color (lime)
pub const STROKE_COLOR: [u8; 3] = [0, 255, 0];

/// Stroke settings for box outlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxStyle {
    pub stroke_width: u32,
    pub color: [u8; 3],
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            stroke_width: STROKE_WIDTH,
            color: STROKE_COLOR,
        }
    }
}

/// Draw an outline for every box, in order, with the default style
pub fn draw_boxes(image: &mut RgbImage, boxes: &[PixelBox]) {
    draw_boxes_with_style(image, boxes, BoxStyle::default());
}

/// Owned variant of [`draw_boxes`]
pub fn annotate(mut image: RgbImage, boxes: &[PixelBox]) -> RgbImage {
    draw_boxes(&mut image, boxes);
    image
}

pub fn draw_boxes_with_style(image: &mut RgbImage, boxes: &[PixelBox], style: BoxStyle) {
    if image.width() == 0 || image.height() == 0 {
        return;
    }
    for pixel_box in boxes {
        draw_outline(image, pixel_box, style);
    }
}

// Corners are snapped to pixel indices inside the frame and reordered, so
// any box value yields a valid rect. Both ends are inclusive, so a zero-area
// box still paints a line or a single point.
fn draw_outline(image: &mut RgbImage, pixel_box: &PixelBox, style: BoxStyle) {
    let max_x = image.width() as i32 - 1;
    let max_y = image.height() as i32 - 1;

    let xa = (pixel_box.x1.round() as i32).clamp(0, max_x);
    let ya = (pixel_box.y1.round() as i32).clamp(0, max_y);
    let xb = (pixel_box.x2.round() as i32).clamp(0, max_x);
    let yb = (pixel_box.y2.round() as i32).clamp(0, max_y);
    let (left, right) = (xa.min(xb), xa.max(xb));
    let (top, bottom) = (ya.min(yb), ya.max(yb));

    // Insets past half the box collapse and stop the loop below
    let stroke = style.stroke_width.clamp(1, i32::MAX as u32) as i32;

    let color = Rgb(style.color);
    for inset in 0..stroke {
        let (l, t, r, b) = (left + inset, top + inset, right - inset, bottom - inset);
        if inset > 0 && (r < l || b < t) {
            break;
        }
        let rect = Rect::at(l, t).of_size((r - l + 1) as u32, (b - t + 1) as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}
