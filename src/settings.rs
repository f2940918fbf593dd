//! User-mutable settings, stored as `settings.json` next to the history file.

use crate::history::{clamp_capacity, DEFAULT_CAPACITY};
use crate::hotkey::HotKey;
use serde::{Deserialize, Deserializer, Serialize};

/// Settings changed from the UI at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// History capacity, always within the allowed range
    #[serde(default = "default_history_limit", deserialize_with = "clamped_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub hotkey: HotKey,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_CAPACITY,
            hotkey: HotKey::default(),
        }
    }
}

fn default_history_limit() -> usize {
    DEFAULT_CAPACITY
}

// Accept any integer (including negative or huge hand-edited values)
fn clamped_limit<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_capacity(raw.clamp(0, u32::MAX as i64) as usize))
}
