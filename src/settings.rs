use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::analytics::{AnalyticsConfig, ZoneRegion};
use crate::detection::{DetectionFilter, PERSON_CLASS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSettings {
    pub alert_threshold: u32,
    pub zone: ZoneRegion,
    pub frame_stride: u32,
    pub heatmap_decay: f32,
    /// Weight of the heatmap layer when blended onto a frame
    pub heatmap_blend: f32,
    pub min_confidence: f32,
    pub target_class: u32,
    /// Delay between emitted frames; 30ms keeps output near 30 fps
    pub pacing_ms: u64,
    /// Re-emit unsampled frames without overlays
    pub passthrough_unsampled: bool,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            alert_threshold: 20,
            zone: ZoneRegion::default(),
            frame_stride: 3,
            heatmap_decay: 0.95,
            heatmap_blend: 0.4,
            min_confidence: 0.35,
            target_class: PERSON_CLASS,
            pacing_ms: 30,
            passthrough_unsampled: false,
        }
    }
}

impl AnalyticsSettings {
    pub fn validate(&self) -> Result<()> {
        if self.alert_threshold < 1 {
            bail!("alert threshold must be at least 1");
        }
        if !self.zone.is_well_formed() {
            bail!(
                "zone ({}, {})-({}, {}) must have x1 < x2 and y1 < y2",
                self.zone.x1,
                self.zone.y1,
                self.zone.x2,
                self.zone.y2
            );
        }
        if self.frame_stride < 1 {
            bail!("frame stride must be at least 1");
        }
        if !(self.heatmap_decay > 0.0 && self.heatmap_decay <= 1.0) {
            bail!("heatmap decay must be in (0, 1], got {}", self.heatmap_decay);
        }
        if !(0.0..=1.0).contains(&self.heatmap_blend) {
            bail!("heatmap blend must be in [0, 1], got {}", self.heatmap_blend);
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!("min confidence must be in [0, 1], got {}", self.min_confidence);
        }
        Ok(())
    }

    pub fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            frame_stride: self.frame_stride,
            zone: self.zone,
            heatmap_decay: self.heatmap_decay,
            ..AnalyticsConfig::default()
        }
    }

    pub fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter {
            target_class: self.target_class,
            min_confidence: self.min_confidence,
        }
    }
}

/// Runtime-settable analytics configuration, persisted as JSON when backed by
/// a file. Invalid updates are rejected and the previous value is kept.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<AnalyticsSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<AnalyticsSettings>(&contents) {
                Ok(parsed) if parsed.validate().is_ok() => parsed,
                Ok(_) | Err(_) => {
                    warn!(
                        "Ignoring invalid settings file {}; using defaults",
                        path.display()
                    );
                    AnalyticsSettings::default()
                }
            }
        } else {
            AnalyticsSettings::default()
        };

        info!("Settings loaded from {}", path.display());

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// In-memory store that never touches disk.
    pub fn ephemeral(settings: AnalyticsSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AnalyticsSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AnalyticsSettings> {
        self.data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> AnalyticsSettings {
        self.read().clone()
    }

    pub fn alert_threshold(&self) -> u32 {
        self.read().alert_threshold
    }

    pub fn set_alert_threshold(&self, threshold: i64) -> Result<()> {
        let threshold = u32::try_from(threshold)
            .ok()
            .filter(|t| *t >= 1)
            .with_context(|| format!("alert threshold must be a positive integer, got {threshold}"))?;
        let mut next = self.get();
        next.alert_threshold = threshold;
        self.update(next)
    }

    pub fn update(&self, settings: AnalyticsSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &AnalyticsSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
