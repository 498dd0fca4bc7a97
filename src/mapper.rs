//! Frame-pixel to overlay-percentage mapping.
//!
//! Detector boxes are in the source frame's native pixel space; the overlay
//! is positioned in percentages of the rendered video box so the renderer
//! needs no knowledge of frame resolution. The mapping is a pure function:
//! no state, no side effects, safe to call concurrently.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::frame::FrameGeometry;

/// Overlay annotation in percentages of the rendered video box.
///
/// Derived and stateless: recomputed every cycle, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub left_pct: f32,
    pub top_pct: f32,
    pub width_pct: f32,
    pub height_pct: f32,
    pub label: String,
    pub confidence: f32,
}

/// Map detections into overlay rects.
///
/// A zero or unknown geometry dimension falls back to a sentinel divisor of
/// 1: the rects come out degenerate, but finite, and the renderer never sees
/// NaN or a division panic.
pub fn map_detections(detections: &[Detection], geometry: FrameGeometry) -> Vec<OverlayRect> {
    let x_div = sentinel_divisor(geometry.pixel_width);
    let y_div = sentinel_divisor(geometry.pixel_height);

    detections
        .iter()
        .map(|detection| OverlayRect {
            left_pct: detection.bbox.x / x_div * 100.0,
            top_pct: detection.bbox.y / y_div * 100.0,
            width_pct: detection.bbox.width / x_div * 100.0,
            height_pct: detection.bbox.height / y_div * 100.0,
            label: detection.label.clone(),
            confidence: detection.confidence,
        })
        .collect()
}

fn sentinel_divisor(dimension: u32) -> f32 {
    if dimension == 0 {
        1.0
    } else {
        dimension as f32
    }
}
