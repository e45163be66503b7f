pub mod analytics;
pub mod db;
pub mod detection;
pub mod notify;
pub mod overlay;
pub mod report;
pub mod server;
pub mod session;
pub mod settings;
pub mod source;
mod utils;

#[cfg(test)]
mod testing;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use db::Database;
use detection::ReplayDetectorFactory;
use notify::{LogNotifier, Notifier, WebhookNotifier};
use session::SessionController;
use settings::SettingsStore;
use source::ImageSequenceFactory;

/// Process-level options; everything tunable at runtime lives in `SettingsStore`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind: String,
    /// Frame rate assumed for image-sequence uploads
    pub fps: f64,
    pub webhook_url: Option<String>,
}

pub struct AppState {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub sessions: SessionController,
}

impl AppState {
    pub fn open(config: &AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let database = Database::new(config.data_dir.join("crowdwatch.sqlite3"))?;
        let settings = Arc::new(SettingsStore::new(config.data_dir.join("settings.json"))?);

        let notifier: Arc<dyn Notifier> = match &config.webhook_url {
            Some(url) => {
                info!("Crowd alerts will be posted to {url}");
                Arc::new(WebhookNotifier::new(url.clone()))
            }
            None => {
                warn!("No webhook configured; crowd alerts are only logged");
                Arc::new(LogNotifier)
            }
        };

        let sessions = SessionController::new(
            database.clone(),
            settings.clone(),
            notifier,
            Arc::new(ImageSequenceFactory::new(config.fps)),
            Arc::new(ReplayDetectorFactory::new()),
        );

        Ok(Self {
            db: database,
            settings,
            sessions,
        })
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Crowdwatch starting up...");

    let state = AppState::open(&config)?;
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {err}");
                return;
            }
            info!("Shutdown requested");
            shutdown.cancel();
        });
    }

    server::serve(listener, state.sessions.clone(), shutdown).await?;
    state.sessions.cancel_session().await?;
    info!("Crowdwatch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn app_state_opens_fresh_data_dir() {
        let data_dir = std::env::temp_dir().join(format!("crowdwatch-app-{}", Uuid::new_v4()));
        let config = AppConfig {
            data_dir: data_dir.clone(),
            bind: "127.0.0.1:0".to_string(),
            fps: 25.0,
            webhook_url: None,
        };

        let state = AppState::open(&config).unwrap();
        assert!(state.db.path().ends_with("crowdwatch.sqlite3"));
        assert_eq!(state.settings.alert_threshold(), 20);
        assert!(state.db.list_history().await.unwrap().is_empty());

        drop(state);
        std::fs::remove_dir_all(data_dir).ok();
    }
}
