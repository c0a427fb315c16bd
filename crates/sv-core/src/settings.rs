//! Display settings

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// How the combined calibration of an axis is averaged across views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAveraging {
    /// Plain mean over contributing views
    #[default]
    Simple,
    /// Mean weighted by each view's extent along the axis
    ExtentWeighted,
}

/// Settings shared by every display created from the same registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Scale averaging rule for the combined interval
    pub scale_averaging: ScaleAveraging,

    /// Distance moved by a single `next`/`previous` step
    pub position_step: f64,

    /// Separator used when de-duplicating display names (`name-1`, `name-2`)
    pub name_separator: String,

    /// Number of worker threads for restructure handling
    pub worker_threads: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            scale_averaging: ScaleAveraging::Simple,
            position_step: 1.0,
            name_separator: "-".to_string(),
            worker_threads: 2,
        }
    }
}

impl DisplaySettings {
    /// Parse settings from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
