use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{error, info};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::{self, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, HistoryRecord};
use crate::detection::DetectorFactory;
use crate::notify::Notifier;
use crate::settings::SettingsStore;
use crate::source::{FrameSourceFactory, VideoUpload};
use crate::{log_error, log_info};

use super::pipeline::{PipelineStep, SessionPipeline};
use super::state::{Session, SessionSnapshot};

const ENABLE_LOGS: bool = true;
const FRAME_BUS_CAPACITY: usize = 16;

/// Encoded frame shared with every stream subscriber.
pub type JpegFrame = Arc<Vec<u8>>;

struct Worker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the single active session. Starting a new one tears down the old
/// driver first; statistics are published by replacing the whole snapshot.
#[derive(Clone)]
pub struct SessionController {
    db: Database,
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    sources: Arc<dyn FrameSourceFactory>,
    detectors: Arc<dyn DetectorFactory>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    frames_tx: broadcast::Sender<JpegFrame>,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl SessionController {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
        sources: Arc<dyn FrameSourceFactory>,
        detectors: Arc<dyn DetectorFactory>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::idle());
        let (frames_tx, _) = broadcast::channel(FRAME_BUS_CAPACITY);
        Self {
            db,
            settings,
            notifier,
            sources,
            detectors,
            snapshot_tx: Arc::new(snapshot_tx),
            frames_tx,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<JpegFrame> {
        self.frames_tx.subscribe()
    }

    /// Replaces any running session. Input errors are published as a failed
    /// snapshot and returned; no analytics state is created for them.
    pub async fn start_session(&self, upload: VideoUpload) -> Result<Session> {
        let mut worker_guard = self.worker.lock().await;
        self.stop_worker(&mut worker_guard).await;
        self.publish(SessionSnapshot::idle());

        let config = self.settings.get();
        let sources = self.sources.clone();
        let detectors = self.detectors.clone();
        let filter = config.detection_filter();
        let upload_for_open = upload.clone();

        let opened = task::spawn_blocking(move || -> Result<_> {
            let source = sources.open(&upload_for_open.path)?;
            let detector = detectors.create(&upload_for_open, filter)?;
            Ok((source, detector))
        })
        .await
        .context("video open task panicked")?;

        let (source, detector) = match opened {
            Ok(parts) => parts,
            Err(err) => {
                let err = err.context(format!("failed to open {}", upload.path.display()));
                error!("Rejected upload {}: {err:#}", upload.video_name);
                self.publish(SessionSnapshot::failed(
                    None,
                    Default::default(),
                    format!("{err:#}"),
                ));
                return Err(err);
            }
        };

        let session = Session::new(&upload, &source.metadata());
        info!(
            "Session {} started for {} ({} frames at {:.2} fps)",
            session.id, session.video_name, session.frame_count, session.fps
        );

        let pipeline = SessionPipeline::new(
            session.clone(),
            source,
            detector,
            self.notifier.clone(),
            self.settings.clone(),
            &config,
        );
        self.publish(SessionSnapshot::streaming(
            session.clone(),
            session.initial_stats(),
        ));

        let cancel_token = CancellationToken::new();
        let pacing = Duration::from_millis(config.pacing_ms.max(1));
        let handle = tokio::spawn(drive_session(
            self.clone(),
            pipeline,
            cancel_token.clone(),
            pacing,
        ));
        *worker_guard = Some(Worker {
            handle,
            cancel_token,
        });

        Ok(session)
    }

    /// Stops the active driver, discards its accumulators and publishes Idle.
    pub async fn cancel_session(&self) -> Result<()> {
        let mut worker_guard = self.worker.lock().await;
        self.stop_worker(&mut worker_guard).await;
        self.publish(SessionSnapshot::idle());
        Ok(())
    }

    async fn stop_worker(&self, slot: &mut Option<Worker>) {
        let Some(worker) = slot.take() else {
            return;
        };
        worker.cancel_token.cancel();
        if let Err(err) = worker.handle.await {
            error!("Session driver failed to join: {err}");
        }
        info!("Session driver torn down");
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        self.snapshot_tx.send_replace(snapshot);
    }

    async fn persist(&self, session: &Session, record: HistoryRecord) {
        let stats = self.snapshot().stats;
        match self.db.append_history(&record).await {
            Ok(id) => {
                log_info!(
                    "Session {} finished: total={} average={} peak={} (history #{id})",
                    session.id,
                    record.total,
                    record.average,
                    record.peak
                );
                self.publish(SessionSnapshot::finished(session.clone(), stats, id));
            }
            Err(err) => {
                let dump = serde_json::to_string(&record)
                    .unwrap_or_else(|_| format!("{record:?}"));
                log_error!("Failed to persist history for session {}: {err:#}; record: {dump}", session.id);
                self.publish(SessionSnapshot::failed(
                    Some(session.clone()),
                    stats,
                    format!("failed to persist session summary: {err:#}"),
                ));
            }
        }
    }
}

async fn drive_session(
    controller: SessionController,
    mut pipeline: SessionPipeline,
    cancel_token: CancellationToken,
    pacing: Duration,
) {
    let session = pipeline.session().clone();
    let mut ticker = time::interval(pacing);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => {
                log_info!("Session {} cancelled", session.id);
                return;
            }
        }

        let joined = task::spawn_blocking(move || {
            let step = pipeline.next();
            (pipeline, step)
        })
        .await;

        let step = match joined {
            Ok((returned, step)) => {
                pipeline = returned;
                step
            }
            Err(err) => {
                log_error!("Session {} pipeline panicked: {err}", session.id);
                controller.publish(SessionSnapshot::failed(
                    Some(session.clone()),
                    controller.snapshot().stats,
                    "frame processing panicked",
                ));
                return;
            }
        };

        // Work finished after cancellation belongs to an abandoned session.
        if cancel_token.is_cancelled() {
            log_info!("Session {} cancelled", session.id);
            return;
        }

        match step {
            Ok(Some(PipelineStep::Frame(output))) => {
                controller.publish(SessionSnapshot::streaming(
                    session.clone(),
                    output.snapshot,
                ));
                // No subscribers is fine.
                let _ = controller.frames_tx.send(Arc::new(output.jpeg));
            }
            Ok(Some(PipelineStep::Finished(record))) => {
                controller.persist(&session, record).await;
                return;
            }
            Ok(None) => return,
            Err(err) => {
                log_error!("Session {} failed: {err:#}", session.id);
                controller.publish(SessionSnapshot::failed(
                    Some(session.clone()),
                    pipeline.snapshot().clone(),
                    format!("{err:#}"),
                ));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::settings::AnalyticsSettings;
    use crate::session::state::SessionPhase;
    use crate::testing::{CountingNotifier, MemorySourceFactory, ScriptedDetectorFactory};

    fn controller_with(
        sources: MemorySourceFactory,
        counts: Vec<usize>,
        notifier: Arc<CountingNotifier>,
    ) -> SessionController {
        let db = Database::new(PathBuf::from(":memory:")).unwrap();
        let settings = Arc::new(SettingsStore::ephemeral(AnalyticsSettings {
            frame_stride: 1,
            pacing_ms: 1,
            ..AnalyticsSettings::default()
        }));
        SessionController::new(
            db,
            settings,
            notifier,
            Arc::new(sources),
            Arc::new(ScriptedDetectorFactory { counts }),
        )
    }

    async fn wait_for_terminal(controller: &SessionController) -> SessionSnapshot {
        let mut rx = controller.watch_snapshot();
        time::timeout(Duration::from_secs(10), async {
            loop {
                let current = rx.borrow_and_update().clone();
                if matches!(current.phase, SessionPhase::Finished | SessionPhase::Failed) {
                    return current;
                }
                if rx.changed().await.is_err() {
                    return current;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn finished_session_is_persisted() {
        let notifier = Arc::new(CountingNotifier::default());
        let mut sources = MemorySourceFactory::new(10);
        sources.fps = 2.0;
        let controller = controller_with(
            sources,
            vec![3, 5, 8, 20, 22, 18, 9, 4, 2, 1],
            notifier.clone(),
        );

        let session = controller
            .start_session(VideoUpload::from_path("/videos/arena.mp4"))
            .await
            .unwrap();
        assert_eq!(session.frame_count, 10);

        let terminal = wait_for_terminal(&controller).await;
        assert_eq!(terminal.phase, SessionPhase::Finished);
        assert!(terminal.done());
        assert_eq!(terminal.stats.live, 1);
        assert_eq!(terminal.stats.total, 22);
        assert_eq!(terminal.stats.duration, 5);
        let delivered = notifier.clone();
        let calls = tokio::task::spawn_blocking(move || delivered.wait_for_calls(1))
            .await
            .unwrap();
        assert_eq!(calls, 1);

        let history = controller.db().list_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(Some(history[0].id), terminal.history_id);
        assert_eq!(history[0].record.video, "arena.mp4");
        assert_eq!(history[0].record.peak, 22);
        assert_eq!(history[0].record.average, 9.2);
        assert_eq!(history[0].record.duration, 5);
    }

    #[tokio::test]
    async fn missing_input_fails_before_streaming() {
        let controller = controller_with(
            MemorySourceFactory::new(5),
            vec![1; 5],
            Arc::new(CountingNotifier::default()),
        );

        let result = controller
            .start_session(VideoUpload::from_path("/videos/missing.mp4"))
            .await;
        assert!(result.is_err());

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Failed);
        assert!(snapshot.session.is_none());
        assert!(snapshot.error.unwrap().contains("does not exist"));
        assert!(controller.db().list_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decode_failure_writes_no_history() {
        let mut sources = MemorySourceFactory::new(8);
        sources.fail_at = Some(4);
        let controller = controller_with(sources, vec![2; 8], Arc::new(CountingNotifier::default()));

        controller
            .start_session(VideoUpload::from_path("/videos/broken.mp4"))
            .await
            .unwrap();

        let terminal = wait_for_terminal(&controller).await;
        assert_eq!(terminal.phase, SessionPhase::Failed);
        assert!(!terminal.done());
        assert_eq!(terminal.stats.frame_index, 3);
        assert!(terminal.error.unwrap().contains("corrupt packet"));
        assert!(controller.db().list_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_discards_the_session() {
        let controller = controller_with(
            MemorySourceFactory::new(100_000),
            vec![4; 16],
            Arc::new(CountingNotifier::default()),
        );
        let mut frames = controller.subscribe_frames();

        controller
            .start_session(VideoUpload::from_path("/videos/long.mp4"))
            .await
            .unwrap();
        let first = time::timeout(Duration::from_secs(10), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!first.is_empty());

        controller.cancel_session().await.unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert!(snapshot.session.is_none());
        assert!(controller.db().list_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_upload_replaces_running_session() {
        let controller = controller_with(
            MemorySourceFactory::new(100_000),
            vec![],
            Arc::new(CountingNotifier::default()),
        );

        let first = controller
            .start_session(VideoUpload::from_path("/videos/one.mp4"))
            .await
            .unwrap();
        let second = controller
            .start_session(VideoUpload::from_path("/videos/two.mp4"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Streaming);
        assert_eq!(snapshot.session.unwrap().id, second.id);

        controller.cancel_session().await.unwrap();
    }

    #[tokio::test]
    async fn new_upload_starts_from_zeroed_totals() {
        let controller = controller_with(
            MemorySourceFactory::new(10),
            vec![3, 5, 8, 20, 22, 18, 9, 4, 2, 1],
            Arc::new(CountingNotifier::default()),
        );

        controller
            .start_session(VideoUpload::from_path("/videos/first.mp4"))
            .await
            .unwrap();
        let first = wait_for_terminal(&controller).await;
        assert_eq!(first.phase, SessionPhase::Finished);
        assert_eq!(first.stats.total, 22);

        // The second upload samples nothing, so anything non-zero leaked over.
        let mut sparse = controller.settings().get();
        sparse.frame_stride = 1000;
        controller.settings().update(sparse).unwrap();

        let second = controller
            .start_session(VideoUpload::from_path("/videos/second.mp4"))
            .await
            .unwrap();
        let opening = controller.snapshot();
        assert_eq!(opening.session.unwrap().id, second.id);
        assert_eq!(opening.stats.live, 0);
        assert_eq!(opening.stats.total, 0);
        assert_eq!(opening.stats.average, 0.0);

        let terminal = wait_for_terminal(&controller).await;
        assert_eq!(terminal.phase, SessionPhase::Finished);
        assert_eq!(terminal.stats.total, 0);
        assert_eq!(terminal.stats.average, 0.0);

        let history = controller.db().list_history().await.unwrap();
        assert_eq!(history.len(), 2);
        let latest = history
            .iter()
            .find(|entry| entry.record.video == "second.mp4")
            .unwrap();
        assert_eq!(latest.record.total, 0);
        assert_eq!(latest.record.peak, 0);
        assert_eq!(latest.record.average, 0.0);
    }
}
