//! Frame acquisition layer.
//!
//! A [`FrameSource`] is a pass-through adapter over the external camera or
//! video collaborator. It exposes three things and nothing else:
//!
//! - readiness (the stream has a decoded frame available),
//! - the current decoded frame,
//! - the intrinsic pixel geometry of the stream.
//!
//! Geometry is re-read on every mapping pass because the camera device or
//! orientation can change it without notification; callers must not cache it.
//!
//! A camera permission failure is represented to the rest of the pipeline as
//! a source that is simply never ready. The scheduler already tolerates that
//! by skipping ticks, so no error surface is needed here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Intrinsic pixel dimensions of the live decoded stream.
///
/// Mutable at the source as devices or orientations change; a value of zero
/// means "unknown" and downstream mapping falls back to a sentinel divisor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl FrameGeometry {
    pub fn new(pixel_width: u32, pixel_height: u32) -> Self {
        Self {
            pixel_width,
            pixel_height,
        }
    }
}

/// One decoded frame: luminance pixels plus the dimensions they were decoded
/// at. Produced fresh per poll; never cached by the pipeline.
#[derive(Clone, Debug)]
pub struct FrameHandle {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Read-only view of the camera/video collaborator.
pub trait FrameSource: Send + Sync {
    /// True once the underlying stream has a decoded frame available.
    fn is_ready(&self) -> bool;

    /// The current decoded frame, or `None` when the source is not ready.
    fn current_frame(&self) -> Option<FrameHandle>;

    /// Intrinsic stream geometry. Re-read on every use.
    fn geometry(&self) -> FrameGeometry;
}

// ----------------------------------------------------------------------------
// CameraSource
// ----------------------------------------------------------------------------

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URL. `stub://` selects the synthetic backend;
    /// `stub-denied://` models a permission failure (never ready).
    pub url: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Time after connect() before the synthetic stream reports ready.
    pub warmup: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_camera".to_string(),
            width: 1280,
            height: 720,
            warmup: Duration::from_millis(0),
        }
    }
}

/// Camera frame source.
///
/// Real device capture lives with the embedding platform; this crate ships a
/// synthetic backend (`stub://`) that simulates a live stream with a moving
/// bright blob, and a denied backend (`stub-denied://`) that never becomes
/// ready.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    Denied,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub-denied://") {
            return Ok(Self {
                backend: CameraBackend::Denied,
            });
        }
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        anyhow::bail!("unsupported camera url scheme: {}", config.url)
    }

    /// Begin streaming. Denied sources accept the call and stay not-ready.
    pub fn connect(&self) -> Result<()> {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            CameraBackend::Denied => {
                log::warn!("CameraSource: permission denied, source will never become ready");
                Ok(())
            }
        }
    }

    /// Frames served so far (synthetic backend only).
    pub fn frames_served(&self) -> u64 {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.frame_count.load(Ordering::Relaxed),
            CameraBackend::Denied => 0,
        }
    }
}

impl FrameSource for CameraSource {
    fn is_ready(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.is_ready(),
            CameraBackend::Denied => false,
        }
    }

    fn current_frame(&self) -> Option<FrameHandle> {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.current_frame(),
            CameraBackend::Denied => None,
        }
    }

    fn geometry(&self) -> FrameGeometry {
        match &self.backend {
            CameraBackend::Synthetic(camera) => {
                FrameGeometry::new(camera.config.width, camera.config.height)
            }
            CameraBackend::Denied => FrameGeometry::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    connected_at: Mutex<Option<Instant>>,
    frame_count: AtomicU64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            connected_at: Mutex::new(None),
            frame_count: AtomicU64::new(0),
        }
    }

    fn connect(&self) -> Result<()> {
        let mut connected_at = self
            .connected_at
            .lock()
            .map_err(|_| anyhow::anyhow!("camera state lock poisoned"))?;
        if connected_at.is_none() {
            *connected_at = Some(Instant::now());
            log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        match self.connected_at.lock() {
            Ok(connected_at) => connected_at
                .map(|at| at.elapsed() >= self.config.warmup)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn current_frame(&self) -> Option<FrameHandle> {
        if !self.is_ready() {
            return None;
        }
        let count = self.frame_count.fetch_add(1, Ordering::Relaxed);
        Some(FrameHandle {
            pixels: self.generate_pixels(count),
            width: self.config.width,
            height: self.config.height,
        })
    }

    /// Render one synthetic luminance frame.
    ///
    /// Dim noisy background plus one bright square that drifts across the
    /// scene with the frame counter, so frame-difference backends see a
    /// plausible moving object.
    fn generate_pixels(&self, count: u64) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; width * height];

        let mut rng = rand::thread_rng();
        for pixel in pixels.iter_mut() {
            *pixel = rng.gen_range(8..24);
        }

        if width == 0 || height == 0 {
            return pixels;
        }

        // Blob drifts diagonally, wrapping at the frame edge.
        let blob_w = (width / 8).max(1);
        let blob_h = (height / 8).max(1);
        let x0 = (count as usize * 7) % width.saturating_sub(blob_w).max(1);
        let y0 = (count as usize * 3) % height.saturating_sub(blob_h).max(1);
        for y in y0..(y0 + blob_h).min(height) {
            for x in x0..(x0 + blob_w).min(width) {
                pixels[y * width + x] = 230;
            }
        }

        pixels
    }
}
