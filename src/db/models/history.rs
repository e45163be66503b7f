use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one completed analysis session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub session_id: String,
    pub video: String,
    /// Distinct track ids observed
    pub total: u64,
    pub average: f64,
    /// Highest live count on any sampled frame
    pub peak: u64,
    pub duration: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: HistoryRecord,
}
