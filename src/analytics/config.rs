use super::{heatmap::DEFAULT_DECAY, window::DEFAULT_WINDOW_CAPACITY, zone::ZoneRegion};

/// Per-session analytics parameters, frozen when a session starts.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Forward every Nth decoded frame for inference
    pub frame_stride: u32,

    /// Region whose strict interior is counted as `zone_count`
    pub zone: ZoneRegion,

    /// Multiplicative heatmap decay applied once per sampled frame
    pub heatmap_decay: f32,

    /// Number of per-sample live counts kept for the rolling average
    pub window_capacity: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            frame_stride: 3,
            zone: ZoneRegion::default(),
            heatmap_decay: DEFAULT_DECAY,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }
}
