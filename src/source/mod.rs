pub mod image_sequence;

pub use image_sequence::{ImageSequenceFactory, ImageSequenceSource};

use std::path::{Path, PathBuf};

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Fallback frame rate when a source reports none.
pub const DEFAULT_FPS: f64 = 25.0;

/// A decoded frame and its 1-based position in the source.
#[derive(Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

/// Reference to an accepted upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUpload {
    pub video_name: String,
    pub path: PathBuf,
}

impl VideoUpload {
    /// Names the upload after the last path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let video_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { video_name, path }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: u64,
    pub size_bytes: u64,
}

impl VideoMetadata {
    pub fn effective_fps(&self) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            DEFAULT_FPS
        }
    }

    /// Whole seconds of footage.
    pub fn duration_secs(&self) -> u64 {
        (self.frame_count as f64 / self.effective_fps()).floor() as u64
    }

    /// Megabytes rounded to two decimals.
    pub fn size_mb(&self) -> f64 {
        let mb = self.size_bytes as f64 / (1024.0 * 1024.0);
        (mb * 100.0).round() / 100.0
    }
}

/// Opaque decode capability. Dropping the source releases its decode handle.
pub trait FrameSource: Send {
    fn metadata(&self) -> VideoMetadata;

    /// Next decoded frame, `Ok(None)` at end of stream, `Err` on decode failure.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

pub trait FrameSourceFactory: Send + Sync {
    /// Fails for missing or unreadable input before any analytics state exists.
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_floors_and_falls_back_to_default_fps() {
        let meta = VideoMetadata {
            fps: 30.0,
            frame_count: 95,
            size_bytes: 0,
        };
        assert_eq!(meta.duration_secs(), 3);

        let unknown = VideoMetadata {
            fps: 0.0,
            frame_count: 100,
            size_bytes: 0,
        };
        assert_eq!(unknown.duration_secs(), 4);
    }

    #[test]
    fn size_is_megabytes_to_two_decimals() {
        let meta = VideoMetadata {
            fps: 25.0,
            frame_count: 0,
            size_bytes: 3 * 1024 * 1024 + 512 * 1024,
        };
        assert_eq!(meta.size_mb(), 3.5);
    }

    #[test]
    fn upload_named_after_path() {
        let upload = VideoUpload::from_path("/videos/mall_entrance");
        assert_eq!(upload.video_name, "mall_entrance");
    }
}
