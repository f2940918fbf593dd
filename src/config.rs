//! Configuration management for the clipboard engine.
//!
//! Loads configuration from a TOML file and provides runtime defaults.
//! User-mutable state (history limit, hotkey) lives in [`crate::settings`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub paste: PasteConfig,

    #[serde(default)]
    pub privacy: PrivacyConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether capture is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between change-counter samples
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_millis(self.interval_ms.max(10))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Maximum preview length in characters
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Longest edge of generated image thumbnails, in pixels
    #[serde(default = "default_thumbnail_max_px")]
    pub thumbnail_max_px: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            thumbnail_max_px: default_thumbnail_max_px(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteConfig {
    /// Delay between restoring an item and posting the paste keystroke
    #[serde(default = "default_keystroke_delay")]
    pub keystroke_delay_ms: u64,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            keystroke_delay_ms: default_keystroke_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// Pasteboard types whose presence skips capture (supports wildcards)
    #[serde(default)]
    pub ignored_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding history.json and settings.json
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    500
}

fn default_preview_chars() -> usize {
    100
}

fn default_thumbnail_max_px() -> u32 {
    256
}

fn default_keystroke_delay() -> u64 {
    150
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pastequick")
            .join("config.toml")
    }

    /// Directory for the history file and settings
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("PasteQuick")
        })
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
