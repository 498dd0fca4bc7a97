//! viewfinder - live detection overlay pipeline
//!
//! This crate turns a polled camera feed into a presentable overlay scene:
//!
//! 1. A [`FrameSource`](frame::FrameSource) exposes the current decoded frame
//!    and its intrinsic pixel geometry, gated behind a readiness flag.
//! 2. The [`DetectionScheduler`](schedule::DetectionScheduler) runs a detector
//!    backend on a fixed cadence, never overlapping inference calls, and
//!    publishes the latest completed detection set.
//! 3. The [`mapper`] converts detector bounding boxes (frame-pixel space)
//!    into percentage rects relative to the rendered video box.
//! 4. The [`GestureSheet`](sheet::GestureSheet) is a drag-controlled bottom
//!    panel with two stable phases and a spring-settled offset.
//! 5. The [`render`] module composes rects and sheet state into a
//!    serializable [`OverlayScene`](render::OverlayScene) that any
//!    presentation layer can consume.
//!
//! Shared-state discipline: the detection feed and the sheet state are each
//! owned by exactly one component and published through a versioned
//! [`StateCell`](state::StateCell); readers observe, they never mutate.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod detect;
pub mod frame;
pub mod mapper;
pub mod render;
pub mod schedule;
pub mod sheet;
pub mod state;

pub use config::ViewfinderConfig;
pub use detect::{BackendRegistry, Detection, DetectorBackend, ModelLoadError, MotionBackend, StubBackend};
pub use frame::{CameraSource, FrameGeometry, FrameHandle, FrameSource};
pub use mapper::{map_detections, OverlayRect};
pub use render::{compose, OverlayScene, SceneGate};
pub use schedule::{Clock, DetectionFeed, DetectionScheduler, SchedulerHandle, SystemClock, TickOutcome};
pub use sheet::{DragSample, GestureSheet, SheetConfig, SheetPhase, SheetState};
pub use state::{StateCell, StateWatcher};

// -------------------- Shared geometry --------------------

/// Axis-aligned box in frame-pixel units, origin top-left.
///
/// This matches the detector output contract: coordinates are relative to
/// the source frame's native resolution, not the rendered video element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
