//! Configuration module for persistent settings.
//!
//! This module handles loading, saving, and validating controller configuration.

use crate::error::ConfigError;
use crate::platform::StaticDisplay;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Allowed range for the initial target frame rate.
pub const TARGET_FRAMERATE_RANGE: (f64, f64) = (60.0, 90.0);
/// Allowed range for the up-attempt budget.
pub const MAX_UP_ATTEMPTS_RANGE: (u32, u32) = (1, 50);
/// Allowed range for the down threshold.
pub const DOWN_THRESHOLD_RANGE: (f64, f64) = (1.0, 10.0);
/// Allowed range for the up threshold.
pub const UP_THRESHOLD_RANGE: (f64, f64) = (0.05, 0.9);

/// Controller configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Warm-up window after activation during which no action is taken
    pub startup_time_secs: f64,
    /// How long a direction must stay stable before a level change
    pub seconds_before_changing_quality: f64,
    pub initial_target_framerate: f64,
    /// Upper clamp applied to the resolved target frame rate
    pub max_target_framerate: f64,
    pub max_up_attempts: u32,
    pub down_threshold: f64,
    pub up_threshold: f64,
    /// Host-side settings used by the bundled frame loop
    pub host: HostConfig,
}

/// Settings for the demo host that drives the controller.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Ordered quality level names, lowest first
    pub level_names: Vec<String>,
    /// Level the platform starts at when nothing is persisted
    pub default_level: i32,
    pub display: StaticDisplay,
    /// Frame cost in milliseconds at the lowest level
    pub base_frame_ms: f64,
    /// Extra frame cost in milliseconds per level step
    pub frame_ms_per_level: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            startup_time_secs: 3.0,
            seconds_before_changing_quality: 2.0,
            initial_target_framerate: 90.0,
            max_target_framerate: 240.0,
            max_up_attempts: 5,
            down_threshold: 2.0,
            up_threshold: 0.5,
            host: HostConfig::default(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            level_names: ["Very Low", "Low", "Medium", "High", "Very High", "Ultra"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_level: 3,
            display: StaticDisplay::default(),
            base_frame_ms: 7.0,
            frame_ms_per_level: 1.2,
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    (min, max): (T, T),
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::ValidationError(format!(
            "{} ({}) must be within [{}, {}]",
            name, value, min, max
        )));
    }
    Ok(())
}

/// A timer setting in seconds must be a non-negative number that fits a `Duration`.
fn timer_duration(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::ValidationError(format!(
            "{} ({}) must be a non-negative number of seconds",
            name, secs
        ))
    })
}

impl QualityConfig {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        timer_duration("startup_time_secs", self.startup_time_secs)?;
        timer_duration(
            "seconds_before_changing_quality",
            self.seconds_before_changing_quality,
        )?;

        check_range(
            "initial_target_framerate",
            self.initial_target_framerate,
            TARGET_FRAMERATE_RANGE,
        )?;
        check_range("max_up_attempts", self.max_up_attempts, MAX_UP_ATTEMPTS_RANGE)?;
        check_range("down_threshold", self.down_threshold, DOWN_THRESHOLD_RANGE)?;
        check_range("up_threshold", self.up_threshold, UP_THRESHOLD_RANGE)?;

        if self.up_threshold >= self.down_threshold {
            return Err(ConfigError::ValidationError(format!(
                "up_threshold ({}) must be lower than down_threshold ({})",
                self.up_threshold, self.down_threshold
            )));
        }

        if !(self.max_target_framerate >= self.initial_target_framerate) {
            return Err(ConfigError::ValidationError(format!(
                "max_target_framerate ({}) cannot be lower than initial_target_framerate ({})",
                self.max_target_framerate, self.initial_target_framerate
            )));
        }

        self.host.validate()
    }

    /// Warm-up window. Saturates for values `validate` would reject.
    pub fn startup_time(&self) -> Duration {
        timer_duration("startup_time_secs", self.startup_time_secs).unwrap_or(Duration::MAX)
    }

    /// Debounce delay. Saturates for values `validate` would reject.
    pub fn stability_delay(&self) -> Duration {
        timer_duration(
            "seconds_before_changing_quality",
            self.seconds_before_changing_quality,
        )
        .unwrap_or(Duration::MAX)
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level_names.is_empty() {
            return Err(ConfigError::ValidationError(
                "host.level_names must name at least one quality level".to_string(),
            ));
        }

        if self.default_level < 0 || self.default_level as usize >= self.level_names.len() {
            return Err(ConfigError::ValidationError(format!(
                "host.default_level ({}) is not one of the {} configured levels",
                self.default_level,
                self.level_names.len()
            )));
        }

        let finite = self.base_frame_ms.is_finite() && self.frame_ms_per_level.is_finite();
        if !finite || !(self.base_frame_ms > 0.0) || !(self.frame_ms_per_level >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "host frame costs must be positive (base {}ms, per level {}ms)",
                self.base_frame_ms, self.frame_ms_per_level
            )));
        }

        Ok(())
    }
}

/// Configuration manager with file I/O.
pub struct ConfigManager {
    config: RwLock<QualityConfig>,
    path: PathBuf,
}

impl ConfigManager {
    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns a manager with default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| {
                ConfigError::ParseError(format!("Failed to read config file: {}", e))
            })?;

            let config: QualityConfig = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

            config.validate()?;
            config
        } else {
            QualityConfig::default()
        };

        Ok(Self {
            config: RwLock::new(config),
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config = self.config.read().map_err(|_| {
            ConfigError::ValidationError("Failed to acquire read lock".to_string())
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&*config)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Get current configuration.
    pub fn get(&self) -> QualityConfig {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|_| QualityConfig::default())
    }

    /// Update configuration with validation.
    pub fn update(&self, config: QualityConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut current = self.config.write().map_err(|_| {
            ConfigError::ValidationError("Failed to acquire write lock".to_string())
        })?;

        *current = config;

        // Release lock before saving
        drop(current);

        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the default config path (~/.config/adaptive-quality/config.json).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("adaptive-quality")
            .join("config.json")
    }
}
