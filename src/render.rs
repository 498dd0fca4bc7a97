//! Overlay scene composition.
//!
//! Pure presentation boundary: [`compose`] takes the mapped overlay rects
//! and the current sheet state as-is and produces a serializable
//! [`OverlayScene`]. No business logic lives here; any rendering layer
//! (DOM, canvas, test harness) consumes the scene directly.
//!
//! The sheet panel is only visible while the detection set is non-empty.
//! Collapsed it shows a count headline; expanded it adds one "label: NN%"
//! row per detection.

use serde::{Deserialize, Serialize};

use crate::mapper::OverlayRect;
use crate::sheet::{SheetConfig, SheetPhase, SheetState};

/// One bounding-box annotation, positioned absolutely by percentage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub left_pct: f32,
    pub top_pct: f32,
    pub width_pct: f32,
    pub height_pct: f32,
    pub caption: String,
}

/// One sheet summary row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub label: String,
    /// Confidence as a rounded percentage.
    pub percent: u8,
}

/// The sheet panel as drawn: position from the live offset, content from
/// the phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenePanel {
    pub visible: bool,
    pub phase: SheetPhase,
    /// Vertical translation in viewport pixels.
    pub offset: f32,
    /// Visible panel height in viewport pixels at the current offset.
    pub height_px: f32,
    pub headline: String,
    /// Detailed rows; present only in the expanded phase.
    pub rows: Vec<SummaryRow>,
}

/// Final visual layer for one cycle. Derived, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayScene {
    pub annotations: Vec<Annotation>,
    pub panel: ScenePanel,
}

/// Compose annotations and the sheet panel into a scene.
///
/// Every value is taken as-is from upstream; an empty rect list produces
/// zero annotation nodes and a hidden panel, never an error.
pub fn compose(rects: &[OverlayRect], sheet: &SheetState, config: &SheetConfig) -> OverlayScene {
    let annotations = rects
        .iter()
        .map(|rect| Annotation {
            left_pct: rect.left_pct,
            top_pct: rect.top_pct,
            width_pct: rect.width_pct,
            height_pct: rect.height_pct,
            caption: rect.label.clone(),
        })
        .collect();

    let rows = if sheet.phase == SheetPhase::Expanded {
        rects
            .iter()
            .map(|rect| SummaryRow {
                label: rect.label.clone(),
                percent: (rect.confidence * 100.0).round().clamp(0.0, 100.0) as u8,
            })
            .collect()
    } else {
        Vec::new()
    };

    let headline = match rects.len() {
        1 => "1 object".to_string(),
        n => format!("{} objects", n),
    };

    OverlayScene {
        annotations,
        panel: ScenePanel {
            visible: !rects.is_empty(),
            phase: sheet.phase,
            offset: sheet.offset,
            height_px: (config.viewport_height - sheet.offset).max(0.0),
            headline,
            rows,
        },
    }
}

/// Change gate for re-render suppression.
///
/// Keeps the last emitted scene and drops composes that did not change it,
/// so the presentation layer re-renders only on updated rects or sheet
/// state.
#[derive(Default)]
pub struct SceneGate {
    last: Option<OverlayScene>,
}

impl SceneGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a scene; returns it when it differs from the last emitted one.
    pub fn push(&mut self, scene: OverlayScene) -> Option<&OverlayScene> {
        if self.last.as_ref() == Some(&scene) {
            return None;
        }
        self.last = Some(scene);
        self.last.as_ref()
    }

    pub fn last(&self) -> Option<&OverlayScene> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(label: &str, confidence: f32) -> OverlayRect {
        OverlayRect {
            left_pct: 10.0,
            top_pct: 10.0,
            width_pct: 20.0,
            height_pct: 20.0,
            label: label.to_string(),
            confidence,
        }
    }

    fn state(phase: SheetPhase) -> SheetState {
        SheetState {
            phase,
            offset: 720.0,
            dragging: false,
        }
    }

    #[test]
    fn empty_rects_render_no_annotations_and_hide_panel() {
        let scene = compose(&[], &state(SheetPhase::Collapsed), &SheetConfig::default());
        assert!(scene.annotations.is_empty());
        assert!(!scene.panel.visible);
    }

    #[test]
    fn collapsed_panel_shows_headline_only() {
        let rects = vec![rect("cat", 0.92), rect("dog", 0.4)];
        let scene = compose(&rects, &state(SheetPhase::Collapsed), &SheetConfig::default());
        assert_eq!(scene.annotations.len(), 2);
        assert_eq!(scene.annotations[0].caption, "cat");
        assert!(scene.panel.visible);
        assert_eq!(scene.panel.headline, "2 objects");
        assert!(scene.panel.rows.is_empty());
        assert_eq!(scene.panel.height_px, 80.0);
    }

    #[test]
    fn expanded_panel_lists_confidence_rows() {
        let rects = vec![rect("cat", 0.92)];
        let scene = compose(&rects, &state(SheetPhase::Expanded), &SheetConfig::default());
        assert_eq!(scene.panel.headline, "1 object");
        assert_eq!(
            scene.panel.rows,
            vec![SummaryRow {
                label: "cat".to_string(),
                percent: 92,
            }]
        );
    }

    #[test]
    fn scene_is_serializable() {
        let rects = vec![rect("cat", 0.92)];
        let scene = compose(&rects, &state(SheetPhase::Expanded), &SheetConfig::default());
        let json = serde_json::to_string(&scene).unwrap();
        let back: OverlayScene = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scene);
    }

    #[test]
    fn gate_suppresses_unchanged_scenes() {
        let mut gate = SceneGate::new();
        let rects = vec![rect("cat", 0.92)];
        let scene = compose(&rects, &state(SheetPhase::Collapsed), &SheetConfig::default());

        assert!(gate.push(scene.clone()).is_some());
        assert!(gate.push(scene).is_none());

        let moved = compose(
            &rects,
            &SheetState {
                phase: SheetPhase::Collapsed,
                offset: 600.0,
                dragging: true,
            },
            &SheetConfig::default(),
        );
        assert!(gate.push(moved).is_some());
    }
}
