use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::StatsSnapshot;
use crate::source::{VideoMetadata, VideoUpload};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Streaming,
    Finished,
    Failed,
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

/// One video-processing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub video_name: String,
    pub source_path: PathBuf,
    pub fps: f64,
    pub frame_count: u64,
    pub duration_secs: u64,
    pub size_mb: f64,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(upload: &VideoUpload, metadata: &VideoMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video_name: upload.video_name.clone(),
            source_path: upload.path.clone(),
            fps: metadata.effective_fps(),
            frame_count: metadata.frame_count,
            duration_secs: metadata.duration_secs(),
            size_mb: metadata.size_mb(),
            started_at: Utc::now(),
        }
    }

    pub fn initial_stats(&self) -> StatsSnapshot {
        StatsSnapshot::for_video(self.duration_secs, self.size_mb)
    }
}

/// What the polling surface sees. Published as a whole value; never patched
/// field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub session: Option<Session>,
    pub stats: StatsSnapshot,
    pub error: Option<String>,
    pub history_id: Option<i64>,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn streaming(session: Session, stats: StatsSnapshot) -> Self {
        Self {
            phase: SessionPhase::Streaming,
            session: Some(session),
            stats,
            error: None,
            history_id: None,
        }
    }

    pub fn finished(session: Session, stats: StatsSnapshot, history_id: i64) -> Self {
        Self {
            phase: SessionPhase::Finished,
            session: Some(session),
            stats,
            error: None,
            history_id: Some(history_id),
        }
    }

    /// `session` is absent when the input could not be opened at all.
    pub fn failed(session: Option<Session>, stats: StatsSnapshot, error: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Failed,
            session,
            stats,
            error: Some(error.into()),
            history_id: None,
        }
    }

    pub fn done(&self) -> bool {
        self.phase == SessionPhase::Finished
    }
}
