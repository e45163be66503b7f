//! Pull-based session pipeline.
//!
//! Each `next()` call consumes decoded frames until one is emitted or the
//! source runs dry. Sampled frames go through detection, analytics, alert
//! dispatch and overlay composition in that order; the last call hands back
//! the summary that should be persisted.

use std::{sync::Arc, thread};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::analytics::{AlertEvent, SessionAnalytics, StatsSnapshot};
use crate::db::HistoryRecord;
use crate::detection::Detector;
use crate::notify::Notifier;
use crate::overlay::{compose_overlay, encode_jpeg};
use crate::settings::{AnalyticsSettings, SettingsStore};
use crate::source::{Frame, FrameSource};
use crate::{log_debug, log_error, log_info, log_warn};

use super::state::Session;

const ENABLE_LOGS: bool = true;

/// One emitted frame and the statistics that were current when it was composed.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame_index: u64,
    pub jpeg: Vec<u8>,
    pub snapshot: StatsSnapshot,
    /// False for passthrough frames and frames whose detection failed
    pub analysed: bool,
}

#[derive(Debug, Clone)]
pub enum PipelineStep {
    Frame(FrameOutput),
    /// Source exhausted; the record still has to be persisted.
    Finished(HistoryRecord),
}

pub struct SessionPipeline {
    session: Session,
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<SettingsStore>,
    analytics: SessionAnalytics,
    snapshot: StatsSnapshot,
    heatmap_blend: f32,
    passthrough_unsampled: bool,
    done: bool,
}

impl SessionPipeline {
    /// Zone, stride and decay are frozen from `config` for the whole session.
    /// The alert threshold is re-read from `settings` on every sampled frame.
    pub fn new(
        session: Session,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<SettingsStore>,
        config: &AnalyticsSettings,
    ) -> Self {
        let snapshot = session.initial_stats();
        Self {
            session,
            source,
            detector,
            notifier,
            settings,
            analytics: SessionAnalytics::new(&config.analytics_config()),
            snapshot,
            heatmap_blend: config.heatmap_blend,
            passthrough_unsampled: config.passthrough_unsampled,
            done: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> &StatsSnapshot {
        &self.snapshot
    }

    pub fn analytics(&self) -> &SessionAnalytics {
        &self.analytics
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// `Ok(None)` once the pipeline has finished or failed. A decode error is
    /// returned once and ends the pipeline without a summary.
    pub fn next(&mut self) -> Result<Option<PipelineStep>> {
        if self.done {
            return Ok(None);
        }

        loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.done = true;
                    return Ok(Some(PipelineStep::Finished(self.summary())));
                }
                Err(err) => {
                    self.done = true;
                    return Err(err.context(format!(
                        "failed to decode {} after frame {}",
                        self.session.video_name, self.snapshot.frame_index
                    )));
                }
            };

            if self.analytics.sampler().should_sample(frame.index) {
                return self.process_sampled(frame).map(Some);
            }

            if self.passthrough_unsampled {
                let output = self.passthrough(frame)?;
                return Ok(Some(PipelineStep::Frame(output)));
            }
        }
    }

    fn process_sampled(&mut self, frame: Frame) -> Result<PipelineStep> {
        let detections = match self.detector.detect_and_track(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                log_warn!(
                    "Detector failed on frame {} of {}; skipping analytics: {err:#}",
                    frame.index,
                    self.session.video_name
                );
                self.snapshot = self.snapshot.with_skipped_frame(frame.index);
                let output = self.passthrough(frame)?;
                return Ok(PipelineStep::Frame(output));
            }
        };

        let threshold = self.settings.alert_threshold();
        let analysis = self.analytics.observe(
            frame.image.width(),
            frame.image.height(),
            &detections,
            threshold,
        );
        self.snapshot = self.snapshot.with_analysis(&analysis, frame.index);

        log_debug!(
            "Frame {}: live={} zone={} total={} status={}",
            frame.index,
            analysis.live,
            analysis.zone_count,
            analysis.total,
            analysis.status.as_str()
        );

        if let Some(alert) = analysis.alert {
            self.dispatch_alert(alert);
        }

        let Frame { index, mut image } = frame;
        compose_overlay(
            &mut image,
            &detections,
            self.analytics.zone(),
            self.analytics.heatmap(),
            self.heatmap_blend,
        );
        let jpeg = encode_jpeg(&image)
            .with_context(|| format!("failed to encode frame {index}"))?;

        Ok(PipelineStep::Frame(FrameOutput {
            frame_index: index,
            jpeg,
            snapshot: self.snapshot.clone(),
            analysed: true,
        }))
    }

    /// Delivery runs on its own thread; failures are only logged.
    fn dispatch_alert(&self, alert: AlertEvent) {
        let notifier = self.notifier.clone();
        let video_name = self.session.video_name.clone();
        let spawned = thread::Builder::new()
            .name("crowdwatch-alert".into())
            .spawn(move || match notifier.notify(alert.live, alert.threshold) {
                Ok(()) => {
                    log_info!(
                        "Crowd alert sent for {}: {} people (threshold {})",
                        video_name,
                        alert.live,
                        alert.threshold
                    );
                }
                Err(err) => {
                    log_error!("Crowd alert dispatch failed for {video_name}: {err:#}");
                }
            });
        if let Err(err) = spawned {
            log_error!("Could not start alert delivery: {err}");
        }
    }

    fn passthrough(&self, frame: Frame) -> Result<FrameOutput> {
        let jpeg = encode_jpeg(&frame.image)
            .with_context(|| format!("failed to encode frame {}", frame.index))?;
        Ok(FrameOutput {
            frame_index: frame.index,
            jpeg,
            snapshot: self.snapshot.clone(),
            analysed: false,
        })
    }

    fn summary(&self) -> HistoryRecord {
        HistoryRecord {
            session_id: self.session.id.clone(),
            video: self.session.video_name.clone(),
            total: self.analytics.total() as u64,
            average: self.analytics.average(),
            peak: self.analytics.peak_live() as u64,
            duration: self.session.duration_secs,
            completed_at: Utc::now(),
        }
    }
}
