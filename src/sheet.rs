//! Drag-controlled bottom sheet.
//!
//! The sheet is a two-state machine (`Collapsed` <-> `Expanded`) with a
//! transient dragging mode that never persists across a gesture. While a
//! drag is live the offset mirrors the pointer delta exactly, with no
//! snapping and possible overshoot past the rest range. At release a pure
//! decision function picks the next phase from the drag's velocity and
//! distance, and a damped spring settles the offset to that phase's fixed
//! resting value. A new drag may start mid-settle and takes over from the
//! current interpolated offset, not the previous commit target.
//!
//! `offset` is the sheet's vertical translation in viewport pixels, measured
//! from the top of the viewport: smaller offset = sheet risen higher.
//! Outside an in-flight drag it always lies within
//! `[expanded_offset, collapsed_offset]`.
//!
//! Input is a [`DragSample`], a plain value decoupled from any pointer-event
//! API; below-threshold releases are a defined no-op, not an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::StateCell;

/// Spring convergence window: close enough and slow enough to snap.
const SETTLE_EPSILON_PX: f32 = 0.5;
const SETTLE_EPSILON_VELOCITY: f32 = 1.0;

/// Stable sheet phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetPhase {
    Collapsed,
    Expanded,
}

/// Sheet geometry, commit thresholds, and spring tuning.
///
/// Platform-specific sizing collapses into this one configuration; there are
/// no per-platform code paths.
#[derive(Clone, Copy, Debug)]
pub struct SheetConfig {
    /// Rendered viewport height in pixels.
    pub viewport_height: f32,
    /// Sheet height as a viewport fraction while collapsed.
    pub collapsed_height_ratio: f32,
    /// Sheet height as a viewport fraction while expanded.
    pub expanded_height_ratio: f32,
    /// Release speed (px/ms) above which the drag direction commits.
    pub velocity_threshold: f32,
    /// Release distance, as a viewport-height fraction, above which the
    /// drag direction commits.
    pub distance_threshold_ratio: f32,
    /// Spring stiffness (1/s^2).
    pub spring_stiffness: f32,
    /// Spring damping (1/s).
    pub spring_damping: f32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            viewport_height: 800.0,
            collapsed_height_ratio: 0.1,
            expanded_height_ratio: 0.4,
            velocity_threshold: 0.2,
            distance_threshold_ratio: 0.15,
            spring_stiffness: 170.0,
            spring_damping: 26.0,
        }
    }
}

impl SheetConfig {
    /// Resting offset while collapsed (sheet mostly below the viewport).
    pub fn collapsed_offset(&self) -> f32 {
        self.viewport_height * (1.0 - self.collapsed_height_ratio)
    }

    /// Resting offset while expanded.
    pub fn expanded_offset(&self) -> f32 {
        self.viewport_height * (1.0 - self.expanded_height_ratio)
    }

    pub fn offset_for(&self, phase: SheetPhase) -> f32 {
        match phase {
            SheetPhase::Collapsed => self.collapsed_offset(),
            SheetPhase::Expanded => self.expanded_offset(),
        }
    }

    fn distance_threshold(&self) -> f32 {
        self.viewport_height * self.distance_threshold_ratio
    }
}

/// One release measurement: vertical travel, release speed, gesture length.
/// `delta_y` and `velocity_y` are negative for upward drags.
#[derive(Clone, Copy, Debug)]
pub struct DragSample {
    pub delta_y: f32,
    /// Pixels per millisecond at release.
    pub velocity_y: f32,
    pub elapsed: Duration,
}

/// Published sheet state: phase, current offset, and whether a drag is live.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetState {
    pub phase: SheetPhase,
    pub offset: f32,
    pub dragging: bool,
}

/// Decide the post-release phase.
///
/// Commit to the direction-indicated phase when the release speed exceeds
/// the velocity threshold OR the travel exceeds the distance threshold;
/// otherwise retain the phase held before the drag began. Upward movement
/// expands, downward collapses. Zero travel with above-threshold velocity
/// takes direction from the velocity sign.
pub fn commit_phase(
    sample: &DragSample,
    phase_before_drag: SheetPhase,
    config: &SheetConfig,
) -> SheetPhase {
    let fast = sample.velocity_y.abs() > config.velocity_threshold;
    let far = sample.delta_y.abs() > config.distance_threshold();
    if !fast && !far {
        return phase_before_drag;
    }

    let direction = if sample.delta_y != 0.0 {
        sample.delta_y
    } else {
        sample.velocity_y
    };
    if direction < 0.0 {
        SheetPhase::Expanded
    } else if direction > 0.0 {
        SheetPhase::Collapsed
    } else {
        phase_before_drag
    }
}

#[derive(Clone, Copy)]
enum Motion {
    Rest,
    Dragging {
        start_phase: SheetPhase,
        start_offset: f32,
    },
    Settling {
        velocity: f32,
    },
}

/// The gesture-driven sheet state machine.
///
/// Single owner of the published [`SheetState`]; drive it with
/// `drag_start` / `drag_move` / `drag_end` and a periodic `step(dt)`.
pub struct GestureSheet {
    config: SheetConfig,
    phase: SheetPhase,
    offset: f32,
    motion: Motion,
    cell: StateCell<SheetState>,
}

impl GestureSheet {
    pub fn new(config: SheetConfig) -> Self {
        let phase = SheetPhase::Collapsed;
        let offset = config.offset_for(phase);
        let state = SheetState {
            phase,
            offset,
            dragging: false,
        };
        Self {
            config,
            phase,
            offset,
            motion: Motion::Rest,
            cell: StateCell::new(state),
        }
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn phase(&self) -> SheetPhase {
        self.phase
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn state(&self) -> SheetState {
        SheetState {
            phase: self.phase,
            offset: self.offset,
            dragging: matches!(self.motion, Motion::Dragging { .. }),
        }
    }

    /// Observable handle to the published state. The sheet is the only
    /// writer.
    pub fn state_cell(&self) -> StateCell<SheetState> {
        self.cell.clone()
    }

    /// True when no drag is live and no settle animation is running.
    pub fn is_settled(&self) -> bool {
        matches!(self.motion, Motion::Rest)
    }

    /// Begin a drag. Interrupts a running settle: the drag takes over from
    /// the current interpolated offset, not the previous commit target.
    pub fn drag_start(&mut self) {
        self.motion = Motion::Dragging {
            start_phase: self.phase,
            start_offset: self.offset,
        };
        self.publish();
    }

    /// Live pointer feedback: offset mirrors the vertical delta exactly.
    /// Calls outside a drag are ignored.
    pub fn drag_move(&mut self, delta_y: f32) {
        let Motion::Dragging { start_offset, .. } = self.motion else {
            return;
        };
        self.offset = start_offset + delta_y;
        self.publish();
    }

    /// Release: commit a phase and start the spring toward its offset.
    pub fn drag_end(&mut self, sample: DragSample) {
        let Motion::Dragging { start_phase, .. } = self.motion else {
            return;
        };
        self.phase = commit_phase(&sample, start_phase, &self.config);
        let target = self.config.offset_for(self.phase);

        if (self.offset - target).abs() < SETTLE_EPSILON_PX {
            // Already at rest (the zero-movement no-op lands here): snap
            // exactly, no animation.
            self.offset = target;
            self.motion = Motion::Rest;
        } else {
            // Seed the spring with the release velocity (px/ms -> px/s).
            self.motion = Motion::Settling {
                velocity: sample.velocity_y * 1000.0,
            };
        }
        self.publish();
    }

    /// Advance the settle animation by `dt`. A no-op at rest or mid-drag.
    pub fn step(&mut self, dt: Duration) {
        let Motion::Settling { velocity } = &mut self.motion else {
            return;
        };
        let target = self.config.offset_for(self.phase);
        let dt_s = dt.as_secs_f32();

        // Semi-implicit Euler on a damped spring toward the target offset.
        let displacement = self.offset - target;
        let acceleration =
            -self.config.spring_stiffness * displacement - self.config.spring_damping * *velocity;
        *velocity += acceleration * dt_s;
        self.offset += *velocity * dt_s;

        // At-rest invariant: the settle path never leaves the rest range.
        let low = self.config.expanded_offset().min(self.config.collapsed_offset());
        let high = self.config.expanded_offset().max(self.config.collapsed_offset());
        if self.offset < low {
            self.offset = low;
            *velocity = 0.0;
        } else if self.offset > high {
            self.offset = high;
            *velocity = 0.0;
        }

        if (self.offset - target).abs() < SETTLE_EPSILON_PX
            && velocity.abs() < SETTLE_EPSILON_VELOCITY
        {
            self.offset = target;
            self.motion = Motion::Rest;
        }
        self.publish();
    }

    fn publish(&self) {
        self.cell.publish(self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> GestureSheet {
        GestureSheet::new(SheetConfig::default())
    }

    fn settle(sheet: &mut GestureSheet) {
        for _ in 0..1000 {
            if sheet.is_settled() {
                return;
            }
            sheet.step(Duration::from_millis(16));
        }
        panic!("sheet did not settle");
    }

    fn release(delta_y: f32, velocity_y: f32) -> DragSample {
        DragSample {
            delta_y,
            velocity_y,
            elapsed: Duration::from_millis(200),
        }
    }

    #[test]
    fn starts_collapsed_at_rest_offset() {
        let sheet = sheet();
        assert_eq!(sheet.phase(), SheetPhase::Collapsed);
        assert_eq!(sheet.offset(), 720.0);
        assert!(sheet.is_settled());
    }

    #[test]
    fn below_threshold_drag_retains_phase() {
        // 5% of viewport height at velocity 0.05: below both thresholds.
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-40.0);
        sheet.drag_end(release(-40.0, -0.05));
        settle(&mut sheet);
        assert_eq!(sheet.phase(), SheetPhase::Collapsed);
        assert_eq!(sheet.offset(), 720.0);
    }

    #[test]
    fn long_slow_drag_commits_by_direction() {
        // 20% of viewport height: above the 15% distance threshold even at
        // zero velocity.
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-160.0);
        sheet.drag_end(release(-160.0, 0.0));
        assert_eq!(sheet.phase(), SheetPhase::Expanded);
        settle(&mut sheet);
        assert_eq!(sheet.offset(), 480.0);
    }

    #[test]
    fn fast_flick_commits_regardless_of_distance() {
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-10.0);
        sheet.drag_end(release(-10.0, -0.6));
        assert_eq!(sheet.phase(), SheetPhase::Expanded);
    }

    #[test]
    fn fast_downward_flick_collapses() {
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-160.0);
        sheet.drag_end(release(-160.0, 0.0));
        settle(&mut sheet);

        sheet.drag_start();
        sheet.drag_move(12.0);
        sheet.drag_end(release(12.0, 0.7));
        assert_eq!(sheet.phase(), SheetPhase::Collapsed);
        settle(&mut sheet);
        assert_eq!(sheet.offset(), 720.0);
    }

    #[test]
    fn zero_movement_release_is_a_no_op() {
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_end(release(0.0, 0.0));
        assert_eq!(sheet.phase(), SheetPhase::Collapsed);
        assert_eq!(sheet.offset(), 720.0);
        assert!(sheet.is_settled());
    }

    #[test]
    fn drag_tracks_pointer_without_snapping() {
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-33.5);
        assert_eq!(sheet.offset(), 720.0 - 33.5);
        assert!(sheet.state().dragging);
        // Overshoot past the rest range is allowed mid-drag.
        sheet.drag_move(-300.0);
        assert_eq!(sheet.offset(), 420.0);
    }

    #[test]
    fn new_drag_takes_over_mid_settle() {
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-160.0);
        sheet.drag_end(release(-160.0, -0.3));
        sheet.step(Duration::from_millis(16));
        sheet.step(Duration::from_millis(16));
        assert!(!sheet.is_settled());
        let mid_flight = sheet.offset();

        sheet.drag_start();
        assert_eq!(sheet.offset(), mid_flight);
        sheet.drag_move(10.0);
        assert_eq!(sheet.offset(), mid_flight + 10.0);
    }

    #[test]
    fn settle_stays_inside_rest_range() {
        let mut sheet = sheet();
        sheet.drag_start();
        sheet.drag_move(-300.0); // overshoot past expanded_offset
        sheet.drag_end(release(-300.0, -0.9));
        let low = sheet.config().expanded_offset();
        let high = sheet.config().collapsed_offset();
        for _ in 0..1000 {
            if sheet.is_settled() {
                break;
            }
            sheet.step(Duration::from_millis(16));
            assert!(sheet.offset() >= low - f32::EPSILON);
            assert!(sheet.offset() <= high + f32::EPSILON);
        }
        assert_eq!(sheet.offset(), sheet.config().expanded_offset());
    }

    #[test]
    fn state_cell_tracks_transitions() {
        let mut sheet = sheet();
        let mut watcher = sheet.state_cell().subscribe();

        sheet.drag_start();
        let state = watcher.poll().expect("drag start published");
        assert!(state.dragging);

        sheet.drag_move(-200.0);
        sheet.drag_end(release(-200.0, -0.4));
        let state = watcher.poll().expect("release published");
        assert!(!state.dragging);
        assert_eq!(state.phase, SheetPhase::Expanded);
    }
}
