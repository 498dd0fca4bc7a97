use anyhow::Result;

use crate::detect::result::Detection;

/// Model loading failed. Fatal: no detection is possible and the pipeline
/// must not start. The core defines no automatic retry; the caller surfaces
/// the error to the user.
///
/// Per-call `detect` failures are NOT this error; they are recoverable and
/// absorbed by the scheduler as an empty detection set for that cycle.
#[derive(Clone, Debug)]
pub struct ModelLoadError {
    pub backend: &'static str,
    pub message: String,
}

impl ModelLoadError {
    pub fn new(backend: &'static str, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model load failed ({}): {}", self.backend, self.message)
    }
}
impl std::error::Error for ModelLoadError {}

/// Detector backend trait.
///
/// The pipeline treats the detector as an opaque collaborator: pixels flow
/// in, detections in frame-pixel space flow out. Implementations must treat
/// the pixel slice as read-only and ephemeral.
pub trait DetectorBackend: Send {
    /// Backend identifier, used for registry lookup and logs.
    fn name(&self) -> &'static str;

    /// Load model weights / warm up. Called once before the first detect.
    ///
    /// Failures should carry a [`ModelLoadError`] so callers can tell a
    /// fatal load failure from a recoverable per-call failure.
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run detection on a frame. May fail per call; the scheduler logs the
    /// failure and treats the cycle as "no detections".
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;
}

impl std::fmt::Debug for dyn DetectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DetectorBackend({})", self.name())
    }
}
