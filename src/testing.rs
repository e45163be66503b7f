//! In-memory doubles for the decode, detection and notification boundaries.

use std::{
    collections::{HashSet, VecDeque},
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Result};
use image::{Rgb, RgbImage};

use crate::detection::{BoundingBox, Detection, DetectionFilter, Detector, DetectorFactory};
use crate::notify::Notifier;
use crate::source::{Frame, FrameSource, FrameSourceFactory, VideoMetadata, VideoUpload};

/// `count` people with track ids `offset..offset + count`, standing inside
/// the default zone.
pub fn crowd(count: usize, offset: u64) -> Vec<Detection> {
    (0..count as u64)
        .map(|i| Detection {
            bbox: BoundingBox::new(290.0, 230.0, 310.0, 270.0),
            class_id: 0,
            track_id: Some(offset + i),
            confidence: 0.9,
        })
        .collect()
}

pub struct MemorySource {
    metadata: VideoMetadata,
    width: u32,
    height: u32,
    next_index: u64,
    fail_at: Option<u64>,
}

impl MemorySource {
    pub fn blank(frames: u64, width: u32, height: u32) -> Self {
        Self {
            metadata: VideoMetadata {
                fps: 25.0,
                frame_count: frames,
                size_bytes: frames * 1024,
            },
            width,
            height,
            next_index: 1,
            fail_at: None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.metadata.fps = fps;
        self
    }

    /// Decoding frame `index` (1-based) fails.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl FrameSource for MemorySource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let index = self.next_index;
        if index > self.metadata.frame_count {
            return Ok(None);
        }
        if self.fail_at == Some(index) {
            bail!("corrupt packet at frame {index}");
        }
        self.next_index += 1;
        Ok(Some(Frame {
            index,
            image: RgbImage::from_pixel(self.width, self.height, Rgb([40, 40, 40])),
        }))
    }
}

/// Returns the scripted crowd for the n-th call, then empty frames.
pub struct ScriptedDetector {
    script: VecDeque<usize>,
    fail_frames: HashSet<u64>,
}

impl ScriptedDetector {
    /// Every call reuses track ids from 0, so the distinct total equals the
    /// largest count.
    pub fn from_counts(counts: &[usize]) -> Self {
        Self {
            script: counts.iter().copied().collect(),
            fail_frames: HashSet::new(),
        }
    }

    /// Calls for these frame indices consume their script entry and fail.
    pub fn failing_on(mut self, frames: &[u64]) -> Self {
        self.fail_frames.extend(frames.iter().copied());
        self
    }
}

impl Detector for ScriptedDetector {
    fn detect_and_track(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let count = self.script.pop_front().unwrap_or(0);
        if self.fail_frames.contains(&frame.index) {
            return Err(anyhow!("inference timed out on frame {}", frame.index));
        }
        Ok(crowd(count, 0))
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl CountingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Blocks for `delay` on every call, then fails like an unreachable relay.
    pub fn stalled(delay: Duration) -> Self {
        Self {
            fail: true,
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Delivery happens off the frame loop, so tests poll for it.
    pub fn wait_for_calls(&self, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.calls() < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        self.calls()
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self, _live: usize, _threshold: u32) -> Result<()> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("smtp relay unreachable");
        }
        Ok(())
    }
}

/// Opens `MemorySource`s; paths containing "missing" fail to open.
pub struct MemorySourceFactory {
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub fail_at: Option<u64>,
}

impl MemorySourceFactory {
    pub fn new(frames: u64) -> Self {
        Self {
            frames,
            width: 640,
            height: 480,
            fps: 25.0,
            fail_at: None,
        }
    }
}

impl FrameSourceFactory for MemorySourceFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        if path.to_string_lossy().contains("missing") {
            bail!("video {} does not exist", path.display());
        }
        let mut source =
            MemorySource::blank(self.frames, self.width, self.height).with_fps(self.fps);
        if let Some(index) = self.fail_at {
            source = source.failing_at(index);
        }
        Ok(Box::new(source))
    }
}

pub struct ScriptedDetectorFactory {
    pub counts: Vec<usize>,
}

impl DetectorFactory for ScriptedDetectorFactory {
    fn create(&self, _upload: &VideoUpload, _filter: DetectionFilter) -> Result<Box<dyn Detector>> {
        Ok(Box::new(ScriptedDetector::from_counts(&self.counts)))
    }
}
