use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::Rect;

const GRID: usize = 16;
const TILE_DELTA_THRESHOLD: f32 = 12.0;

/// CPU frame-difference backend.
///
/// Splits each luminance frame into a GRID x GRID tile grid, compares tile
/// means against the previous frame, and reports the union of changed tiles
/// as one "motion" detection. Confidence scales with the changed-tile
/// fraction. The first frame has no baseline and reports nothing.
pub struct MotionBackend {
    last_hash: Option<[u8; 32]>,
    last_means: Option<Vec<f32>>,
}

impl MotionBackend {
    pub fn new() -> Self {
        Self {
            last_hash: None,
            last_means: None,
        }
    }

    fn tile_means(pixels: &[u8], width: usize, height: usize) -> Vec<f32> {
        let mut sums = vec![0.0f64; GRID * GRID];
        let mut counts = vec![0u32; GRID * GRID];
        for y in 0..height {
            let ty = y * GRID / height;
            for x in 0..width {
                let tx = x * GRID / width;
                let tile = ty * GRID + tx;
                sums[tile] += pixels[y * width + x] as f64;
                counts[tile] += 1;
            }
        }
        sums.iter()
            .zip(&counts)
            .map(|(sum, count)| {
                if *count == 0 {
                    0.0
                } else {
                    (*sum / *count as f64) as f32
                }
            })
            .collect()
    }
}

impl Default for MotionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for MotionBackend {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let w = width as usize;
        let h = height as usize;
        if w == 0 || h == 0 || pixels.len() < w * h {
            anyhow::bail!(
                "frame size mismatch: {} bytes for {}x{}",
                pixels.len(),
                width,
                height
            );
        }

        // Identical frame short-circuit: no recompute, no motion.
        let current_hash: [u8; 32] = Sha256::digest(&pixels[..w * h]).into();
        if self.last_hash == Some(current_hash) {
            return Ok(vec![]);
        }
        self.last_hash = Some(current_hash);

        let means = Self::tile_means(&pixels[..w * h], w, h);
        let Some(prev) = self.last_means.take() else {
            self.last_means = Some(means);
            return Ok(vec![]);
        };

        let mut min_tx = GRID;
        let mut min_ty = GRID;
        let mut max_tx = 0usize;
        let mut max_ty = 0usize;
        let mut changed = 0usize;
        for ty in 0..GRID {
            for tx in 0..GRID {
                let tile = ty * GRID + tx;
                if (means[tile] - prev[tile]).abs() > TILE_DELTA_THRESHOLD {
                    changed += 1;
                    min_tx = min_tx.min(tx);
                    min_ty = min_ty.min(ty);
                    max_tx = max_tx.max(tx);
                    max_ty = max_ty.max(ty);
                }
            }
        }

        // The new means become the baseline for the next frame either way.
        self.last_means = Some(means);

        if changed == 0 {
            return Ok(vec![]);
        }

        let tile_w = w as f32 / GRID as f32;
        let tile_h = h as f32 / GRID as f32;
        let bbox = Rect::new(
            min_tx as f32 * tile_w,
            min_ty as f32 * tile_h,
            (max_tx - min_tx + 1) as f32 * tile_w,
            (max_ty - min_ty + 1) as f32 * tile_h,
        );
        let confidence = (0.5 + changed as f32 / (GRID * GRID) as f32).min(0.99);

        Ok(vec![Detection::new("motion", confidence, bbox)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: usize, height: usize, fill: u8) -> Vec<u8> {
        vec![fill; width * height]
    }

    #[test]
    fn first_frame_reports_nothing() {
        let mut backend = MotionBackend::new();
        let detections = backend.detect(&frame(64, 64, 10), 64, 64).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn identical_frames_report_no_motion() {
        let mut backend = MotionBackend::new();
        backend.detect(&frame(64, 64, 10), 64, 64).unwrap();
        let detections = backend.detect(&frame(64, 64, 10), 64, 64).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn bright_region_yields_bounding_box() {
        let mut backend = MotionBackend::new();
        backend.detect(&frame(64, 64, 10), 64, 64).unwrap();

        // Light up the top-left quadrant.
        let mut second = frame(64, 64, 10);
        for y in 0..32 {
            for x in 0..32 {
                second[y * 64 + x] = 250;
            }
        }
        let detections = backend.detect(&second, 64, 64).unwrap();
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.label, "motion");
        assert_eq!(d.bbox.x, 0.0);
        assert_eq!(d.bbox.y, 0.0);
        // Changed region covers half the frame on each axis.
        assert!((d.bbox.width - 32.0).abs() < 4.0 + f32::EPSILON);
        assert!((d.bbox.height - 32.0).abs() < 4.0 + f32::EPSILON);
        assert!(d.confidence > 0.5);
    }

    #[test]
    fn baseline_advances_across_frames() {
        // Flat baseline, then a bright square at the origin, then the same
        // square moved to the opposite corner. Both changed frames must
        // report motion; the second one only does if the baseline advanced.
        let mut backend = MotionBackend::new();
        backend.detect(&frame(64, 64, 10), 64, 64).unwrap();

        let mut second = frame(64, 64, 10);
        for y in 0..16 {
            for x in 0..16 {
                second[y * 64 + x] = 250;
            }
        }
        assert_eq!(backend.detect(&second, 64, 64).unwrap().len(), 1);

        let mut third = frame(64, 64, 10);
        for y in 48..64 {
            for x in 48..64 {
                third[y * 64 + x] = 250;
            }
        }
        let detections = backend.detect(&third, 64, 64).unwrap();
        assert_eq!(detections.len(), 1);
        // The reported box spans the vacated and the newly lit corners.
        let d = &detections[0];
        assert_eq!(d.bbox.x, 0.0);
        assert_eq!(d.bbox.y, 0.0);
        assert!(d.bbox.width > 32.0);
        assert!(d.bbox.height > 32.0);
    }

    #[test]
    fn unchanged_frame_after_motion_retains_baseline() {
        let mut backend = MotionBackend::new();
        backend.detect(&frame(64, 64, 10), 64, 64).unwrap();
        assert_eq!(backend.detect(&frame(64, 64, 200), 64, 64).unwrap().len(), 1);
        // A frame identical in tile means to the previous one is quiet, and
        // the baseline it leaves behind still reflects the bright frame.
        assert!(backend.detect(&frame(64, 64, 200), 64, 64).unwrap().is_empty());
        assert_eq!(backend.detect(&frame(64, 64, 10), 64, 64).unwrap().len(), 1);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut backend = MotionBackend::new();
        assert!(backend.detect(&[0u8; 16], 64, 64).is_err());
    }
}
