use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::Rect;

/// Stub backend for tests and the demo daemon.
///
/// Emits one detection with a box at 10% of the frame origin and 20% of the
/// frame extent, so the mapped overlay rect is the same on any geometry.
pub struct StubBackend {
    label: String,
    confidence: f32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            label: "person".to_string(),
            confidence: 0.9,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let w = width as f32;
        let h = height as f32;
        Ok(vec![Detection::new(
            self.label.clone(),
            self.confidence,
            Rect::new(w * 0.1, h * 0.1, w * 0.2, h * 0.2),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_scales_with_frame_size() {
        let mut backend = StubBackend::new();
        let detections = backend.detect(&[], 1280, 720).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, Rect::new(128.0, 72.0, 256.0, 144.0));
        assert_eq!(detections[0].label, "person");
    }
}
