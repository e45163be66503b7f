use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use super::{Frame, FrameSource, FrameSourceFactory, VideoMetadata};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A video delivered as a directory of still frames, decoded in file-name order.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    cursor: usize,
    metadata: VideoMetadata,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to open video directory {}", dir.display()))?;

        let mut frames = Vec::new();
        let mut size_bytes = 0u64;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let path = entry.path();
            if !is_frame_file(&path) {
                continue;
            }
            size_bytes += entry
                .metadata()
                .with_context(|| format!("failed to stat {}", path.display()))?
                .len();
            frames.push(path);
        }

        if frames.is_empty() {
            bail!("no decodable frames found in {}", dir.display());
        }
        frames.sort();

        let metadata = VideoMetadata {
            fps,
            frame_count: frames.len() as u64,
            size_bytes,
        };

        Ok(Self {
            frames,
            cursor: 0,
            metadata,
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        self.cursor += 1;
        Ok(Some(Frame {
            index: self.cursor as u64,
            image,
        }))
    }
}

pub struct ImageSequenceFactory {
    fps: f64,
}

impl ImageSequenceFactory {
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }
}

impl FrameSourceFactory for ImageSequenceFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(ImageSequenceSource::open(path, self.fps)?))
    }
}
