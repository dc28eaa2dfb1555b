//! Run configuration
//!
//! A `Config` is assembled once by the binary from built-in defaults, an
//! optional TOML file and the process environment, then handed to each stage.

mod conf;

pub use conf::{MonitoringConfig, SourceConfig};

use crate::error::ConfigError;
use crate::filters::FilterConfig;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the GitHub access token
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
/// Environment variables holding the cloud project id, in lookup order
pub const PROJECT_ID_VARS: [&str; 2] = ["PROJECT_ID", "project_id"];
/// Environment variables holding the notification channel id, in lookup order
pub const CHANNEL_ID_VARS: [&str; 2] = ["NOTIFICATION_CHANNEL_ID", "notification_channel_id"];
/// Environment variable holding a ready-made OAuth2 access token
pub const ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
/// Environment variable holding the cloud credentials file path
pub const CREDENTIALS_FILE_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub filters: FilterConfig,
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Read configuration from a TOML file
    ///
    /// Sections and fields absent from the file keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Build the configuration for a run from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from an environment lookup; empty values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = get(GITHUB_TOKEN_VAR) {
            self.source.token = Some(token);
        }
        if let Some(project) = PROJECT_ID_VARS.iter().find_map(|key| get(*key)) {
            debug!("Using project id from environment");
            self.monitoring.project_id = project;
        }
        if let Some(channel) = CHANNEL_ID_VARS.iter().find_map(|key| get(*key)) {
            self.monitoring.notification_channel = channel;
        }
        if let Some(token) = get(ACCESS_TOKEN_VAR) {
            self.monitoring.access_token = Some(token);
        }
        if let Some(path) = get(CREDENTIALS_FILE_VAR) {
            self.monitoring.credentials_file = Some(PathBuf::from(path));
        }
    }

    /// Check that every required identifier is present and sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("source.owner", &self.source.owner),
            ("source.repo", &self.source.repo),
            ("source.branch", &self.source.branch),
            ("source.path", &self.source.path),
            ("monitoring.policy_name", &self.monitoring.policy_name),
            ("filters.severity", &self.filters.severity),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        if self.monitoring.project_id.trim().is_empty() {
            return Err(ConfigError::MissingValue(format!(
                "cloud project id (set {} or monitoring.project_id)",
                PROJECT_ID_VARS[0]
            )));
        }
        if self.monitoring.notification_channel.trim().is_empty() {
            return Err(ConfigError::MissingValue(format!(
                "notification channel (set {} or monitoring.notification_channel)",
                CHANNEL_ID_VARS[0]
            )));
        }
        if self.monitoring.rate_limit_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "monitoring.rate_limit_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
