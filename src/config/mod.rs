use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::pose_frame_processor::FrameProcessorConfig;
use crate::services::session_logger::SessionLoggerConfig;
use crate::storage::RetryConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub cues: CuesConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Overrides the exercise profile's top threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_threshold_up: Option<f64>,

    /// Overrides the exercise profile's bottom threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_threshold_down: Option<f64>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    #[serde(default = "default_symmetry_tolerance")]
    pub symmetry_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuesConfig {
    #[serde(default = "default_occlusion_cooldown_ms")]
    pub occlusion_cooldown_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `false` runs in offline mode
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_debounce_ms() -> u64 {
    300
}

fn default_visibility_threshold() -> f64 {
    0.5
}

fn default_symmetry_tolerance() -> f64 {
    15.0
}

fn default_sync_interval_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_occlusion_cooldown_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            angle_threshold_up: None,
            angle_threshold_down: None,
            debounce_ms: default_debounce_ms(),
            visibility_threshold: default_visibility_threshold(),
            symmetry_tolerance: default_symmetry_tolerance(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval_ms(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CuesConfig {
    fn default() -> Self {
        Self {
            occlusion_cooldown_ms: default_occlusion_cooldown_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Config {
    /// Get config directory path (~/.opticrep/)
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".opticrep"))
    }

    /// Get config file path (~/.opticrep/config.toml)
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    /// Load configuration from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values the tracker cannot work with
    pub fn validate(&self) -> Result<()> {
        let tracker = &self.tracker;

        if !(0.0..=1.0).contains(&tracker.visibility_threshold) {
            bail!(
                "tracker.visibility_threshold must be between 0 and 1, got {}",
                tracker.visibility_threshold
            );
        }
        if tracker.symmetry_tolerance < 0.0 {
            bail!("tracker.symmetry_tolerance must not be negative");
        }
        for (name, value) in [
            ("angle_threshold_up", tracker.angle_threshold_up),
            ("angle_threshold_down", tracker.angle_threshold_down),
        ] {
            if let Some(value) = value {
                if !(0.0..=180.0).contains(&value) {
                    bail!("tracker.{} must be between 0 and 180, got {}", name, value);
                }
            }
        }
        if let (Some(up), Some(down)) = (tracker.angle_threshold_up, tracker.angle_threshold_down) {
            if down >= up {
                bail!(
                    "tracker.angle_threshold_down ({}) must be below angle_threshold_up ({})",
                    down,
                    up
                );
            }
        }
        if self.logger.max_retries == 0 {
            bail!("logger.max_retries must be at least 1");
        }

        Ok(())
    }

    pub fn frame_processor_config(&self) -> FrameProcessorConfig {
        FrameProcessorConfig {
            visibility_threshold: self.tracker.visibility_threshold,
            symmetry_tolerance: self.tracker.symmetry_tolerance,
            debounce_ms: self.tracker.debounce_ms,
            angle_threshold_up: self.tracker.angle_threshold_up,
            angle_threshold_down: self.tracker.angle_threshold_down,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.logger.max_retries,
            initial_delay_ms: self.logger.retry_initial_delay_ms,
            max_delay_ms: self.logger.retry_max_delay_ms,
            ..Default::default()
        }
    }

    pub fn session_logger_config(&self) -> SessionLoggerConfig {
        SessionLoggerConfig {
            sync_interval: Duration::from_millis(self.logger.sync_interval_ms),
            retry: self.retry_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tracker.debounce_ms, 300);
        assert_eq!(config.tracker.visibility_threshold, 0.5);
        assert_eq!(config.tracker.angle_threshold_up, None);
        assert_eq!(config.logger.sync_interval_ms, 5000);
        assert_eq!(config.cues.occlusion_cooldown_ms, 5000);
        assert!(config.storage.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tracker]
            angle_threshold_up = 160.0
            angle_threshold_down = 45.0

            [storage]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.angle_threshold_up, Some(160.0));
        assert_eq!(config.tracker.debounce_ms, 300);
        assert_eq!(config.logger.max_retries, 3);
        assert!(!config.storage.enabled);

        let processor = config.frame_processor_config();
        assert_eq!(processor.angle_threshold_down, Some(45.0));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.logger.sync_interval_ms = 1000;
        config.tracker.angle_threshold_down = Some(60.0);
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[tracker]\nangle_threshold_up = 90.0\nangle_threshold_down = 120.0\n",
        )
        .unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("angle_threshold_down"));
    }

    #[test]
    fn test_invalid_visibility_rejected() {
        let mut config = Config::default();
        config.tracker.visibility_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.logger.max_retries = 5;
        config.logger.sync_interval_ms = 2500;

        let logger = config.session_logger_config();
        assert_eq!(logger.sync_interval, Duration::from_millis(2500));
        assert_eq!(logger.retry.max_retries, 5);
        assert_eq!(logger.retry.backoff_factor, 2.0);
    }
}
