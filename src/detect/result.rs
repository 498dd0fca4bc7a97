use serde::{Deserialize, Serialize};

use crate::Rect;

/// One inferred object instance.
///
/// The bounding box is in frame-pixel units (origin top-left, native source
/// resolution). A detection set is produced fresh each inference cycle and
/// wholly replaced by the next successful cycle; no per-object identity
/// persists across cycles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Confidence in 0..=1.
    pub confidence: f32,
    pub bbox: Rect,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: Rect) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}
