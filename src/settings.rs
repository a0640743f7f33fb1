use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::segmentation::{SegmentationConfig, DEFAULT_GAP_THRESHOLD_SECS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationSettings {
    pub gap_threshold_secs: u64,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            gap_threshold_secs: DEFAULT_GAP_THRESHOLD_SECS,
        }
    }
}

impl From<&SegmentationSettings> for SegmentationConfig {
    fn from(settings: &SegmentationSettings) -> Self {
        SegmentationConfig::with_gap_threshold_secs(settings.gap_threshold_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    #[serde(default)]
    segmentation: SegmentationSettings,
}

/// JSON-file-backed settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn segmentation(&self) -> SegmentationSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .segmentation
            .clone()
    }

    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig::from(&self.segmentation())
    }

    pub fn update_segmentation(&self, settings: SegmentationSettings) -> Result<()> {
        if settings.gap_threshold_secs == 0 {
            bail!("gap threshold must be at least one second");
        }

        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.segmentation = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }
}
