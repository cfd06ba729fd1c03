// Engine configuration - synth command and playback tuning, stored as RON

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sequencer::session::SessionOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub synth_command: String,
    pub synth_args: Vec<String>,
    /// Appended to the synth arguments when set
    pub soundfont: Option<PathBuf>,
    pub tick_interval_ms: u64,
    pub stop_timeout_ms: u64,
    pub loop_playback: bool,
    pub notification_capacity: usize,
    pub default_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            synth_command: "fluidsynth".to_string(),
            synth_args: vec!["-n".to_string(), "-i".to_string()],
            soundfont: None,
            tick_interval_ms: 2,
            stop_timeout_ms: 2000,
            loop_playback: false,
            notification_capacity: 64,
            default_seed: None,
        }
    }
}

impl EngineConfig {
    /// `<config dir>/jamtrack/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jamtrack").join("config.ron"))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_or_default() -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_ron_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_ron_str(text: &str) -> ConfigResult<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Tick interval clamped to 1..=5 ms
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.clamp(1, 5))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Full argument list for the synth process
    pub fn synth_arguments(&self) -> Vec<String> {
        let mut args = self.synth_args.clone();
        if let Some(soundfont) = &self.soundfont {
            args.push(soundfont.display().to_string());
        }
        args
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            tick_interval: self.tick_interval(),
            stop_timeout: self.stop_timeout(),
            looping: self.loop_playback,
            notification_capacity: self.notification_capacity.max(1),
        }
    }
}
