use crate::alerts::ReplaceStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the log pattern file lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
    /// Raw content host, overridable for GitHub Enterprise
    pub base_url: String,
    /// GitHub access token, only ever read from the environment
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            owner: "digitalapicraft".to_string(),
            repo: "dac-analytics-api".to_string(),
            branch: "main".to_string(),
            path: "src/main/resources/cloud-monitoring/logs.json".to_string(),
            base_url: "https://raw.githubusercontent.com".to_string(),
            token: None,
        }
    }
}

/// Target project and shape of the alert policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub project_id: String,
    /// Notification channel id or full `projects/.../notificationChannels/...` name
    pub notification_channel: String,
    pub policy_name: String,
    pub rate_limit_seconds: u64,
    pub replace_strategy: ReplaceStrategy,
    /// Cloud Monitoring REST endpoint
    pub endpoint: String,
    pub credentials_file: Option<PathBuf>,
    /// Ready-made OAuth2 access token, only ever read from the environment
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            notification_channel: String::new(),
            policy_name: "dac-analytics-api-alerts".to_string(),
            rate_limit_seconds: 3600,
            replace_strategy: ReplaceStrategy::DeleteThenCreate,
            endpoint: "https://monitoring.googleapis.com".to_string(),
            credentials_file: None,
            access_token: None,
        }
    }
}

impl MonitoringConfig {
    /// Full resource name of the notification channel
    pub fn notification_channel_name(&self) -> String {
        if self.notification_channel.starts_with("projects/") {
            self.notification_channel.clone()
        } else {
            format!(
                "projects/{}/notificationChannels/{}",
                self.project_id, self.notification_channel
            )
        }
    }
}
