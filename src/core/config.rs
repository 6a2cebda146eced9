/// Player configuration, loaded from RON.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::narration::NarrationSettings;
use crate::core::playback::DEFAULT_DWELL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("dwell must be greater than zero")]
    ZeroDwell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub enabled: bool,
    /// Speech program to run; detected from the host when unset.
    pub program: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        let settings = NarrationSettings::default();
        Self {
            enabled: true,
            program: None,
            rate: settings.rate,
            pitch: settings.pitch,
        }
    }
}

impl NarrationConfig {
    pub fn settings(&self) -> NarrationSettings {
        NarrationSettings {
            rate: self.rate,
            pitch: self.pitch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub dwell_ms: u64,
    /// Location used when no URL is given; share links are built from it.
    pub base_url: String,
    /// Extra catalog merged over the built-in one.
    pub catalog: Option<PathBuf>,
    pub narration: NarrationConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            dwell_ms: DEFAULT_DWELL.as_millis() as u64,
            base_url: "http://localhost:5173/".to_string(),
            catalog: None,
            narration: NarrationConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn parse_ron(source: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_ms == 0 {
            return Err(ConfigError::ZeroDwell);
        }
        Ok(())
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}
