use serde::{Deserialize, Serialize};

/// Class id of the subject of interest (COCO `person`).
pub const PERSON_CLASS: u32 = 0;

/// Axis-aligned box in frame-space pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// The mean of two `i32`s always fits back into `i32`.
fn midpoint(a: f32, b: f32) -> i32 {
    ((a as i32 as i64 + b as i32 as i64).div_euclid(2)) as i32
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer midpoint. Coordinates truncate first, then the sum is
    /// floor-divided, so the center may land outside the frame for boxes
    /// that straddle an edge. Out-of-range coordinates saturate at the `i32`
    /// bounds.
    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.x1, self.x2), midpoint(self.y1, self.y2))
    }

    /// Maps a box from inference resolution back to frame space.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

/// One observed subject in one sampled frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    /// Stable across frames of one session once the tracker confirms it.
    pub track_id: Option<u64>,
    pub confidence: f32,
}

/// Adapter-side filter: only the target class above the confidence floor
/// reaches the analytics.
#[derive(Debug, Clone, Copy)]
pub struct DetectionFilter {
    pub target_class: u32,
    pub min_confidence: f32,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            target_class: PERSON_CLASS,
            min_confidence: 0.35,
        }
    }
}

impl DetectionFilter {
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.class_id == self.target_class && detection.confidence >= self.min_confidence
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}
