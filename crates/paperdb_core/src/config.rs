//! Store configuration.
//!
//! # Responsibility
//! - Describe where the store and its history live and how replay/merge behave.
//! - Load that description from JSON.
//!
//! # Invariants
//! - `history_root` is never empty after validation.
//! - Missing optional fields take the documented defaults.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// What replay does with a record that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Stop and report the file and line.
    #[default]
    Stop,
    /// Log a warning and continue with the next record.
    Skip,
}

/// File logging settings passed to [`crate::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Must be absolute.
    pub log_dir: PathBuf,
}

fn default_level() -> String {
    crate::logging::default_log_level().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite file. `None` keeps the store in memory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Directory holding history partitions.
    pub history_root: PathBuf,
    #[serde(default)]
    pub replay_policy: ReplayPolicy,
    /// Record canonical-map redirects for ids folded by a merge, so later
    /// acquisitions of the same content resolve to the merge target.
    #[serde(default = "default_redirect_merged")]
    pub redirect_merged: bool,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_redirect_merged() -> bool {
    true
}

impl StoreConfig {
    /// Creates a config with defaults for everything but the history root.
    pub fn new(history_root: impl Into<PathBuf>) -> Self {
        Self {
            db_path: None,
            history_root: history_root.into(),
            replay_policy: ReplayPolicy::default(),
            redirect_merged: default_redirect_merged(),
            logging: None,
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(db_path.into());
        self
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("history_root cannot be empty".to_string()));
        }
        if let Some(logging) = &self.logging {
            if !logging.log_dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.log_dir must be an absolute path, got `{}`",
                    logging.log_dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ReplayPolicy, StoreConfig};
    use std::path::PathBuf;

    #[test]
    fn json_defaults_fill_optional_fields() {
        let config = StoreConfig::from_json_str(r#"{"history_root": "history"}"#).unwrap();
        assert_eq!(config, StoreConfig::new("history"));
        assert_eq!(config.replay_policy, ReplayPolicy::Stop);
        assert!(config.redirect_merged);
    }

    #[test]
    fn json_overrides_are_applied() {
        let config = StoreConfig::from_json_str(
            r#"{
                "db_path": "papers.db",
                "history_root": "history",
                "replay_policy": "skip",
                "redirect_merged": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("papers.db")));
        assert_eq!(config.replay_policy, ReplayPolicy::Skip);
        assert!(!config.redirect_merged);
    }

    #[test]
    fn validation_rejects_empty_history_root_and_relative_log_dir() {
        let err = StoreConfig::from_json_str(r#"{"history_root": ""}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = StoreConfig::from_json_str(
            r#"{"history_root": "h", "logging": {"log_dir": "logs"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{"history_root": "h", "cache": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
