//! Request-facing operations. Errors are flattened to strings for the HTTP
//! layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analytics::StatsSnapshot;
use crate::db::HistoryEntry;
use crate::report::export_history_csv;
use crate::settings::AnalyticsSettings;
use crate::source::VideoUpload;

use super::{Session, SessionController, SessionPhase};

/// Polling payload: the latest statistics plus where the session stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub state: SessionPhase,
    pub done: bool,
    pub error: Option<String>,
    pub video_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub video_path: PathBuf,
    pub video_name: Option<String>,
}

pub fn get_stats(controller: &SessionController) -> StatsResponse {
    let snapshot = controller.snapshot();
    StatsResponse {
        done: snapshot.done(),
        state: snapshot.phase,
        error: snapshot.error,
        video_name: snapshot.session.map(|session| session.video_name),
        stats: snapshot.stats,
    }
}

pub async fn start_session(
    controller: &SessionController,
    request: StartSessionRequest,
) -> Result<Session, String> {
    let mut upload = VideoUpload::from_path(request.video_path);
    if let Some(name) = request.video_name.filter(|name| !name.trim().is_empty()) {
        upload.video_name = name;
    }
    controller
        .start_session(upload)
        .await
        .map_err(|e| format!("{e:#}"))
}

pub async fn cancel_session(controller: &SessionController) -> Result<(), String> {
    controller.cancel_session().await.map_err(|e| e.to_string())
}

pub fn set_threshold(controller: &SessionController, threshold: i64) -> Result<u32, String> {
    let settings = controller.settings();
    settings
        .set_alert_threshold(threshold)
        .map_err(|e| e.to_string())?;
    Ok(settings.alert_threshold())
}

pub fn get_settings(controller: &SessionController) -> AnalyticsSettings {
    controller.settings().get()
}

pub fn update_settings(
    controller: &SessionController,
    settings: AnalyticsSettings,
) -> Result<AnalyticsSettings, String> {
    controller
        .settings()
        .update(settings)
        .map_err(|e| e.to_string())?;
    Ok(controller.settings().get())
}

pub async fn get_history(controller: &SessionController) -> Result<Vec<HistoryEntry>, String> {
    controller
        .db()
        .list_history()
        .await
        .map_err(|e| e.to_string())
}

pub async fn download_report(controller: &SessionController) -> Result<String, String> {
    let entries = get_history(controller).await?;
    export_history_csv(&entries).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{Database, HistoryRecord};
    use crate::settings::SettingsStore;
    use crate::testing::{CountingNotifier, MemorySourceFactory, ScriptedDetectorFactory};

    fn controller() -> SessionController {
        SessionController::new(
            Database::new(PathBuf::from(":memory:")).unwrap(),
            Arc::new(SettingsStore::ephemeral(AnalyticsSettings::default())),
            Arc::new(CountingNotifier::default()),
            Arc::new(MemorySourceFactory::new(3)),
            Arc::new(ScriptedDetectorFactory { counts: vec![] }),
        )
    }

    #[test]
    fn idle_stats_are_not_done() {
        let response = get_stats(&controller());
        assert_eq!(response.state, SessionPhase::Idle);
        assert!(!response.done);
        assert!(response.video_name.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["live"], 0);
        assert_eq!(json["status"], "LOW");
    }

    #[test]
    fn threshold_validation_is_reported() {
        let controller = controller();
        assert_eq!(set_threshold(&controller, 15).unwrap(), 15);
        let err = set_threshold(&controller, 0).unwrap_err();
        assert!(err.contains("positive"));
        assert_eq!(get_settings(&controller).alert_threshold, 15);
    }

    #[tokio::test]
    async fn custom_video_name_is_kept() {
        let controller = controller();
        let session = start_session(
            &controller,
            StartSessionRequest {
                video_path: PathBuf::from("/uploads/1f3a.bin"),
                video_name: Some("north gate.mp4".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(session.video_name, "north gate.mp4");
        cancel_session(&controller).await.unwrap();
    }

    #[tokio::test]
    async fn report_lists_persisted_sessions() {
        let controller = controller();
        controller
            .db()
            .append_history(&HistoryRecord {
                session_id: "s1".into(),
                video: "lobby.mp4".into(),
                total: 4,
                average: 1.5,
                peak: 3,
                duration: 8,
                completed_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let history = get_history(&controller).await.unwrap();
        assert_eq!(history.len(), 1);
        let csv = download_report(&controller).await.unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("1,lobby.mp4,4,1.5,3,8,"));
    }
}
