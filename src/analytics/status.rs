use serde::{Deserialize, Serialize};

/// Below this many people a scene is always `Low`.
pub const MEDIUM_FLOOR: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrowdStatus {
    #[default]
    Low,
    Medium,
    High,
}

impl CrowdStatus {
    /// `Low` under ten, `High` at or above the alert threshold, `Medium` between.
    /// The floor check wins when the threshold is configured under ten.
    pub fn classify(live: usize, threshold: u32) -> Self {
        if live < MEDIUM_FLOOR {
            CrowdStatus::Low
        } else if live < threshold as usize {
            CrowdStatus::Medium
        } else {
            CrowdStatus::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdStatus::Low => "LOW",
            CrowdStatus::Medium => "MEDIUM",
            CrowdStatus::High => "HIGH",
        }
    }
}
