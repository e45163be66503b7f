pub mod replay;
pub mod types;

pub use replay::{ReplayDetector, ReplayDetectorFactory};
pub use types::{BoundingBox, Detection, DetectionFilter, PERSON_CLASS};

use anyhow::Result;

use crate::source::{Frame, VideoUpload};

/// Detection-and-tracking engine boundary.
///
/// Implementations return only target-class detections, in a deterministic
/// order for a given frame and tracker state. Track ids must be stable for the
/// lifetime of one detector instance; the analytics never invent or merge them.
pub trait Detector: Send {
    fn detect_and_track(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Builds a detector with fresh tracker state for each session.
pub trait DetectorFactory: Send + Sync {
    fn create(&self, upload: &VideoUpload, filter: DetectionFilter) -> Result<Box<dyn Detector>>;
}
