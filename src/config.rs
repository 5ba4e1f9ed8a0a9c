//! Configuration for the engagement scorer.

use crate::core::ScorerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "classroom-engagement";

/// Main configuration for the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Polling cadence
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Width of the trailing aggregation window
    #[serde(with = "duration_serde")]
    pub window: Duration,

    /// Directory holding both logs
    pub data_path: PathBuf,

    /// Emotion log file name, relative to `data_path`
    pub emotion_file: PathBuf,

    /// Engagement score log file name, relative to `data_path`
    pub engagement_file: PathBuf,

    /// Scores below this value are reported as low-engagement alerts
    pub alert_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            interval: Duration::from_secs(30),
            window: Duration::from_secs(30),
            data_path: data_dir,
            emotion_file: PathBuf::from("emotions.csv"),
            engagement_file: PathBuf::from("engagement.csv"),
            alert_threshold: 50.0,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults if
    /// it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Reject settings the scorer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid("interval must be at least 1 second".into()));
        }
        if self.window.is_zero() {
            return Err(ConfigError::Invalid("window must be at least 1 second".into()));
        }
        if !(0.0..=100.0).contains(&self.alert_threshold) {
            return Err(ConfigError::Invalid(format!(
                "alert_threshold must be within 0..=100, got {}",
                self.alert_threshold
            )));
        }
        Ok(())
    }

    /// Apply command-line overrides and validate the result.
    pub fn with_overrides(
        mut self,
        interval_secs: Option<u64>,
        window_secs: Option<u64>,
        alert_threshold: Option<f64>,
    ) -> Result<Self, ConfigError> {
        if let Some(secs) = interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = window_secs {
            self.window = Duration::from_secs(secs);
        }
        if let Some(threshold) = alert_threshold {
            self.alert_threshold = threshold;
        }
        self.validate()?;
        Ok(self)
    }

    /// Full path of the emotion log.
    pub fn emotion_log_path(&self) -> PathBuf {
        self.data_path.join(&self.emotion_file)
    }

    /// Full path of the engagement score log.
    pub fn engagement_log_path(&self) -> PathBuf {
        self.data_path.join(&self.engagement_file)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Scorer parameters derived from this configuration.
    pub fn scorer_settings(&self) -> ScorerSettings {
        ScorerSettings {
            interval: self.interval,
            window: self.window,
            alert_threshold: self.alert_threshold,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.window, Duration::from_secs(30));
        assert_eq!(config.alert_threshold, 50.0);
        assert!(config.emotion_log_path().ends_with("emotions.csv"));
        assert!(config.engagement_log_path().ends_with("engagement.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "interval": 10, "data_path": "/tmp/class" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.window, Duration::from_secs(30));
        assert_eq!(config.emotion_log_path(), PathBuf::from("/tmp/class/emotions.csv"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            window: Duration::from_secs(60),
            alert_threshold: 40.0,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides_then_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::default()
            .with_overrides(Some(15), None, Some(35.0))
            .unwrap();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.window, Duration::from_secs(30));
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.interval, Duration::from_secs(15));
        assert_eq!(reloaded.alert_threshold, 35.0);

        assert!(matches!(
            Config::default().with_overrides(None, Some(0), None),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validation() {
        let zero_interval = Config {
            interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(zero_interval.validate(), Err(ConfigError::Invalid(_))));

        let bad_threshold = Config {
            alert_threshold: 120.0,
            ..Config::default()
        };
        assert!(matches!(bad_threshold.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_scorer_settings() {
        let settings = Config::default().scorer_settings();
        assert_eq!(settings, ScorerSettings::default());
    }
}
