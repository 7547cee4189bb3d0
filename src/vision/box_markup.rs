// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Parser for the box markup embedded in perception model output
//!
//! Boxes arrive inline in the text answer:
//!
//! ```text
//! The cat is here <point_box mention="cat"> (102,215) (488,730) </point_box>.
//! ```
//!
//! Each pair is `(x,y)` in the model's coordinate space; the first pair is
//! the top-left corner and the second the bottom-right.

use std::sync::OnceLock;

use regex::Regex;

use super::geometry::{DetectionBox, SpacePoint};

fn point_box_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<point_box([^>]*)>(.*?)</point_box>").expect("point_box pattern")
    })
}

fn coordinate_pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\(\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)")
            .expect("coordinate pair pattern")
    })
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"mention\s*=\s*"([^"]*)""#).expect("mention attribute pattern")
    })
}

/// Extract every `<point_box>` tag from `text`, in order of appearance
///
/// Tags with fewer than two coordinate pairs are still returned, with the
/// missing corners left as `None`, so the caller decides how to report them.
pub fn parse_point_boxes(text: &str) -> Vec<DetectionBox> {
    point_box_pattern()
        .captures_iter(text)
        .map(|caps| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

            let mention = mention_pattern()
                .captures(attrs)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .filter(|m| !m.is_empty());

            let mut points = coordinate_pair_pattern().captures_iter(body).filter_map(|c| {
                let x = c.get(1)?.as_str().parse::<f64>().ok()?;
                let y = c.get(2)?.as_str().parse::<f64>().ok()?;
                Some(SpacePoint::new(x, y))
            });

            DetectionBox {
                mention,
                top_left: points.next(),
                bottom_right: points.next(),
            }
        })
        .collect()
}
