//! Streaming crowd statistics.
//!
//! `SessionAnalytics` owns every per-session accumulator and folds one sampled
//! frame's detections into them at a time. It has no I/O; decoding, inference,
//! overlays and persistence live in `session::pipeline`.

pub mod alert;
pub mod config;
pub mod heatmap;
pub mod identity;
pub mod sampler;
pub mod status;
pub mod window;
pub mod zone;

pub use alert::{AlertDebouncer, AlertEvent, AlertPhase};
pub use config::AnalyticsConfig;
pub use heatmap::HeatmapAccumulator;
pub use identity::IdentityRegistry;
pub use sampler::FrameSampler;
pub use status::CrowdStatus;
pub use window::SlidingWindowStats;
pub use zone::ZoneRegion;

use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// Result of folding one sampled frame into the session accumulators.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub live: usize,
    pub zone_count: usize,
    pub total: usize,
    pub average: f64,
    pub status: CrowdStatus,
    pub alert: Option<AlertEvent>,
}

/// Latest published statistics. Replaced wholesale on every sampled frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub live: usize,
    pub total: usize,
    pub average: f64,
    pub duration: u64,
    pub size: f64,
    pub zone_count: usize,
    pub status: CrowdStatus,
    pub frame_index: u64,
    pub sampled_frames: u64,
    pub skipped_frames: u64,
}

impl StatsSnapshot {
    /// Snapshot for a freshly opened video, before any frame is analysed.
    pub fn for_video(duration: u64, size: f64) -> Self {
        Self {
            duration,
            size,
            ..Self::default()
        }
    }

    pub fn with_analysis(&self, analysis: &FrameAnalysis, frame_index: u64) -> Self {
        Self {
            live: analysis.live,
            total: analysis.total,
            average: analysis.average,
            zone_count: analysis.zone_count,
            status: analysis.status,
            frame_index,
            sampled_frames: self.sampled_frames + 1,
            ..self.clone()
        }
    }

    /// Previous statistics carried forward for a frame whose analytics were skipped.
    pub fn with_skipped_frame(&self, frame_index: u64) -> Self {
        Self {
            frame_index,
            skipped_frames: self.skipped_frames + 1,
            ..self.clone()
        }
    }
}

pub struct SessionAnalytics {
    sampler: FrameSampler,
    zone: ZoneRegion,
    heatmap: HeatmapAccumulator,
    identities: IdentityRegistry,
    window: SlidingWindowStats,
    debouncer: AlertDebouncer,
    peak_live: usize,
}

impl SessionAnalytics {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            sampler: FrameSampler::new(config.frame_stride),
            zone: config.zone,
            heatmap: HeatmapAccumulator::new(config.heatmap_decay),
            identities: IdentityRegistry::new(),
            window: SlidingWindowStats::new(config.window_capacity),
            debouncer: AlertDebouncer::new(),
            peak_live: 0,
        }
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    pub fn zone(&self) -> &ZoneRegion {
        &self.zone
    }

    pub fn heatmap(&self) -> &HeatmapAccumulator {
        &self.heatmap
    }

    pub fn total(&self) -> usize {
        self.identities.size()
    }

    pub fn average(&self) -> f64 {
        self.window.average()
    }

    pub fn peak_live(&self) -> usize {
        self.peak_live
    }

    pub fn alert_phase(&self) -> AlertPhase {
        self.debouncer.phase()
    }

    /// Folds one sampled frame: registry, zone, heatmap hit + decay, window,
    /// status, then debounce, in that order.
    pub fn observe(
        &mut self,
        frame_width: u32,
        frame_height: u32,
        detections: &[Detection],
        threshold: u32,
    ) -> FrameAnalysis {
        self.heatmap.ensure_initialized(frame_width, frame_height);

        let live = detections.len();
        let mut zone_count = 0;
        for detection in detections {
            self.identities.observe(detection.track_id);
            let (cx, cy) = detection.bbox.center();
            if self.zone.contains(cx, cy) {
                zone_count += 1;
            }
            self.heatmap.record(cx, cy);
        }
        self.heatmap.decay();

        self.window.push(live);
        self.peak_live = self.peak_live.max(live);

        let status = CrowdStatus::classify(live, threshold);
        let alert = self.debouncer.evaluate(live, threshold);

        FrameAnalysis {
            live,
            zone_count,
            total: self.identities.size(),
            average: self.window.average(),
            status,
            alert,
        }
    }
}
