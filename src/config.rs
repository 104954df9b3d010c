// Application settings: JSON file with serde defaults, then environment
// overrides, then validation.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calendar::ReferenceZone;
use crate::error::ConfigError;

pub const ENV_CONFIG_PATH: &str = "BAKERY_REPORT_CONFIG";
pub const ENV_DATA_DIR: &str = "BAKERY_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "BAKERY_OUTPUT_DIR";
pub const ENV_TIMEZONE: &str = "BAKERY_TIMEZONE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `products.csv`, `production.csv`, `disposal.csv`.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// IANA zone name used for calendar-date normalization.
    pub reference_timezone: String,
    pub moving_average_window: usize,
    pub anomaly_z_threshold: f64,
    pub trend_dead_zone: f64,
    /// Report window length when none is entered.
    pub default_window_days: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("reports"),
            reference_timezone: "America/New_York".to_string(),
            moving_average_window: 3,
            anomaly_z_threshold: 2.0,
            trend_dead_zone: 0.05,
            default_window_days: 30,
        }
    }
}

impl AppConfig {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(AppConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolve the config path from the environment, load, apply overrides
    /// and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| "bakery_report.json".to_string());
        let mut cfg = AppConfig::load(Path::new(&path))?;
        cfg.apply_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_TIMEZONE).filter(|v| !v.trim().is_empty()) {
            self.reference_timezone = v.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zone()?;
        if self.moving_average_window == 0 {
            return Err(ConfigError::Invalid {
                key: "moving_average_window",
                message: "must be at least 1".to_string(),
            });
        }
        if !(self.anomaly_z_threshold.is_finite() && self.anomaly_z_threshold > 0.0) {
            return Err(ConfigError::Invalid {
                key: "anomaly_z_threshold",
                message: "must be a finite positive number".to_string(),
            });
        }
        if !(self.trend_dead_zone.is_finite() && self.trend_dead_zone >= 0.0) {
            return Err(ConfigError::Invalid {
                key: "trend_dead_zone",
                message: "must be a finite non-negative number".to_string(),
            });
        }
        if self.default_window_days == 0 {
            return Err(ConfigError::Invalid {
                key: "default_window_days",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn zone(&self) -> Result<ReferenceZone, ConfigError> {
        self.reference_timezone.parse()
    }

    pub fn thresholds(&self) -> crate::metrics::Thresholds {
        crate::metrics::Thresholds {
            anomaly_z: self.anomaly_z_threshold,
            trend_dead_zone: self.trend_dead_zone,
            moving_average_window: self.moving_average_window,
        }
    }
}
