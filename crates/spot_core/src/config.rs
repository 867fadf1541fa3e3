//! Runtime configuration for the task store and drag controller.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - `validate()` runs on every parse path.

use crate::model::task::{normalize_task_name, MAX_TASK_NAME_CHARS};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Durable key used by the browser build; kept for data compatibility.
pub const DEFAULT_STORAGE_KEY: &str = "spot-tasks";
const DEFAULT_TOUCH_DRAG_DELAY_MS: u64 = 100;
const DEFAULT_TOUCH_SCROLL_SLOP_PX: f32 = 10.0;

/// Configuration validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    EmptyStorageKey,
    ZeroNameCap,
    InvalidScrollSlop(f32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config is not valid JSON: {err}"),
            Self::EmptyStorageKey => write!(f, "storage_key must not be blank"),
            Self::ZeroNameCap => write!(f, "max_name_chars must be at least 1"),
            Self::InvalidScrollSlop(value) => {
                write!(f, "touch_scroll_slop_px must be finite and >= 0, got {value}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotConfig {
    /// Durable key holding the whole task sequence.
    pub storage_key: String,
    /// Character cap applied by `normalize_name`.
    pub max_name_chars: usize,
    /// Hold time before a touch turns into a drag.
    pub touch_drag_delay_ms: u64,
    /// Finger travel during the hold that counts as scrolling.
    pub touch_scroll_slop_px: f32,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_name_chars: MAX_TASK_NAME_CHARS,
            touch_drag_delay_ms: DEFAULT_TOUCH_DRAG_DELAY_MS,
            touch_scroll_slop_px: DEFAULT_TOUCH_SCROLL_SLOP_PX,
        }
    }
}

impl SpotConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        if self.max_name_chars == 0 {
            return Err(ConfigError::ZeroNameCap);
        }
        if !self.touch_scroll_slop_px.is_finite() || self.touch_scroll_slop_px < 0.0 {
            return Err(ConfigError::InvalidScrollSlop(self.touch_scroll_slop_px));
        }
        Ok(())
    }

    /// Collapses whitespace and caps the name at `max_name_chars`;
    /// `None` when nothing printable is left.
    pub fn normalize_name(&self, raw: &str) -> Option<String> {
        normalize_task_name(raw, self.max_name_chars)
    }

    pub fn touch_drag_delay(&self) -> Duration {
        Duration::from_millis(self.touch_drag_delay_ms)
    }
}
