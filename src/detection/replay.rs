//! Replays tracker output recorded offline as JSON lines.
//!
//! Each line describes one frame:
//! `{"frame": 3, "inferenceWidth": 640, "inferenceHeight": 360, "detections": [...]}`.
//! The inference size is optional; when present boxes are scaled to the
//! decoded frame's size.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use super::{Detection, DetectionFilter, Detector, DetectorFactory};
use crate::source::{Frame, VideoUpload};

pub const DEFAULT_REPLAY_FILE: &str = "detections.jsonl";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayLine {
    frame: u64,
    inference_width: Option<u32>,
    inference_height: Option<u32>,
    #[serde(default)]
    detections: Vec<Detection>,
}

struct ReplayFrame {
    inference_size: Option<(u32, u32)>,
    detections: Vec<Detection>,
}

pub struct ReplayDetector {
    frames: HashMap<u64, ReplayFrame>,
    filter: DetectionFilter,
}

impl ReplayDetector {
    pub fn from_file(path: &Path, filter: DetectionFilter) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections from {}", path.display()))?;
        Self::from_lines(&contents, filter)
            .with_context(|| format!("invalid detections file {}", path.display()))
    }

    pub fn from_lines(contents: &str, filter: DetectionFilter) -> Result<Self> {
        let mut frames = HashMap::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parsed: ReplayLine = serde_json::from_str(line)
                .with_context(|| format!("line {} is not a replay record", line_no + 1))?;
            let inference_size = parsed.inference_width.zip(parsed.inference_height);
            frames.insert(
                parsed.frame,
                ReplayFrame {
                    inference_size,
                    detections: parsed.detections,
                },
            );
        }
        Ok(Self { frames, filter })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Detector for ReplayDetector {
    fn detect_and_track(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let Some(recorded) = self.frames.get(&frame.index) else {
            return Ok(Vec::new());
        };

        let (sx, sy) = match recorded.inference_size {
            Some((w, h)) if w > 0 && h > 0 => (
                frame.image.width() as f32 / w as f32,
                frame.image.height() as f32 / h as f32,
            ),
            _ => (1.0, 1.0),
        };

        let detections = recorded
            .detections
            .iter()
            .filter(|d| self.filter.accepts(d))
            .map(|d| Detection {
                bbox: d.bbox.scaled(sx, sy),
                ..d.clone()
            })
            .collect();
        Ok(detections)
    }
}

/// Locates the replay file next to the uploaded video: inside it for an
/// image-sequence directory, or as a sibling `<video>.jsonl` otherwise.
pub struct ReplayDetectorFactory {
    file_name: String,
}

impl ReplayDetectorFactory {
    pub fn new() -> Self {
        Self {
            file_name: DEFAULT_REPLAY_FILE.to_string(),
        }
    }

    fn replay_path(&self, upload: &VideoUpload) -> PathBuf {
        if upload.path.is_dir() {
            upload.path.join(&self.file_name)
        } else {
            upload.path.with_extension("jsonl")
        }
    }
}

impl Default for ReplayDetectorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorFactory for ReplayDetectorFactory {
    fn create(&self, upload: &VideoUpload, filter: DetectionFilter) -> Result<Box<dyn Detector>> {
        let path = self.replay_path(upload);
        let detector = ReplayDetector::from_file(&path, filter)?;
        info!(
            "Loaded replayed detections for {} frames from {}",
            detector.frame_count(),
            path.display()
        );
        Ok(Box::new(detector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    const LINES: &str = r#"
{"frame": 3, "detections": [{"bbox": {"x1": 10, "y1": 10, "x2": 30, "y2": 50}, "classId": 0, "trackId": 1, "confidence": 0.8}, {"bbox": {"x1": 0, "y1": 0, "x2": 5, "y2": 5}, "classId": 2, "trackId": 9, "confidence": 0.9}]}
{"frame": 6, "inferenceWidth": 320, "inferenceHeight": 240, "detections": [{"bbox": {"x1": 10, "y1": 10, "x2": 20, "y2": 20}, "classId": 0, "trackId": null, "confidence": 0.5}]}
"#;

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            image: RgbImage::new(640, 480),
        }
    }

    #[test]
    fn replays_filtered_detections_by_frame_index() {
        let mut detector = ReplayDetector::from_lines(LINES, DetectionFilter::default()).unwrap();
        assert_eq!(detector.frame_count(), 2);

        let third = detector.detect_and_track(&frame(3)).unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].track_id, Some(1));

        assert!(detector.detect_and_track(&frame(4)).unwrap().is_empty());
    }

    #[test]
    fn scales_from_inference_resolution() {
        let mut detector = ReplayDetector::from_lines(LINES, DetectionFilter::default()).unwrap();
        let sixth = detector.detect_and_track(&frame(6)).unwrap();
        assert_eq!(sixth.len(), 1);
        assert_eq!(sixth[0].bbox.x1, 20.0);
        assert_eq!(sixth[0].bbox.y2, 40.0);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let result = ReplayDetector::from_lines("{\"frame\": \"x\"}", DetectionFilter::default());
        assert!(result.is_err());
    }
}
