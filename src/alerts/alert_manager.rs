use crate::alerts::client::AlertPolicyService;
use crate::alerts::policy::{
    AlertPolicy, AlertStrategy, Combiner, Condition, LOG_MATCH_CONDITION_LIMIT,
};
use crate::config::MonitoringConfig;
use crate::error::MonitoringError;
use crate::filters::search_expression;
use crate::pattern::LogPattern;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How an existing policy with the target display name is replaced
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStrategy {
    /// Delete every same-name policy, then create a fresh one
    #[default]
    DeleteThenCreate,
    /// Patch the first same-name policy in place and delete any others
    Update,
}

/// Everything the manager needs to know about the policy it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySettings {
    pub project_id: String,
    pub display_name: String,
    /// Full notification channel resource name
    pub notification_channel: String,
    pub rate_limit: Duration,
    pub strategy: ReplaceStrategy,
}

impl From<&MonitoringConfig> for PolicySettings {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            display_name: config.policy_name.clone(),
            notification_channel: config.notification_channel_name(),
            rate_limit: Duration::from_secs(config.rate_limit_seconds),
            strategy: config.replace_strategy,
        }
    }
}

impl PolicySettings {
    /// Assemble the policy for `pattern`: conditions OR-combined, enabled,
    /// notifying the configured channel at most once per rate-limit period
    ///
    /// # Errors
    ///
    /// Returns `MonitoringError::NoConditions` when no record carries a payload.
    pub fn build_policy(&self, pattern: &LogPattern) -> Result<AlertPolicy, MonitoringError> {
        let conditions = AlertPolicyManager::build_conditions(pattern);
        if conditions.is_empty() {
            return Err(MonitoringError::NoConditions);
        }

        let policy = AlertPolicy {
            name: None,
            display_name: self.display_name.clone(),
            conditions,
            combiner: Combiner::Or,
            notification_channels: vec![self.notification_channel.clone()],
            enabled: true,
            alert_strategy: Some(AlertStrategy::rate_limited(self.rate_limit)),
        };
        if policy.exceeds_log_match_limit() {
            warn!(
                "Policy '{}' has {} log-match conditions; Cloud Monitoring accepts {}",
                policy.display_name,
                policy.conditions.len(),
                LOG_MATCH_CONDITION_LIMIT
            );
            if self.strategy == ReplaceStrategy::DeleteThenCreate {
                warn!(
                    "A rejected create after deletion leaves the project without this policy; \
                     consider replace_strategy = \"update\""
                );
            }
        }
        Ok(policy)
    }
}

/// Result of replacing the managed policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutcome {
    /// The policy as stored after the run
    pub policy: AlertPolicy,
    /// Resource names of the policies that were deleted
    pub deleted: Vec<String>,
    /// Whether an existing policy was patched instead of a new one created
    pub updated: bool,
}

/// Keeps exactly one log-based alert policy per display name in a project
///
/// Each run lists the project's policies, removes or replaces the ones with
/// the managed display name and submits a policy rebuilt from the current log
/// pattern document. With `ReplaceStrategy::DeleteThenCreate` a failure after
/// the deletions leaves the project without the policy; nothing is rolled back.
pub struct AlertPolicyManager {
    service: Arc<dyn AlertPolicyService>,
    settings: PolicySettings,
}

impl AlertPolicyManager {
    pub fn new(service: Arc<dyn AlertPolicyService>, settings: PolicySettings) -> Self {
        Self { service, settings }
    }

    /// One log-match condition per record that carries a non-empty payload
    ///
    /// Conditions are numbered by the record's position in the `logs` array.
    pub fn build_conditions(pattern: &LogPattern) -> Vec<Condition> {
        pattern
            .logs
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| match record.payload() {
                Some(payload) => Some(Condition::matched_log(
                    format!("Error Log Condition {}", idx + 1),
                    search_expression(payload),
                )),
                None => {
                    warn!("Log record {} has no textPayload text, skipping", idx + 1);
                    None
                }
            })
            .collect()
    }

    /// Build the policy that a replace would submit, without calling the service
    pub fn plan(&self, pattern: &LogPattern) -> Result<AlertPolicy, MonitoringError> {
        self.settings.build_policy(pattern)
    }

    /// Replace the managed policy with one built from `pattern`
    ///
    /// The policy is built before any call is made, so a document without
    /// usable records leaves the project untouched. Service errors abort the
    /// run and are returned unchanged.
    pub async fn replace_policy(
        &self,
        pattern: &LogPattern,
    ) -> Result<PolicyOutcome, MonitoringError> {
        let mut policy = self.plan(pattern)?;
        let project_id = self.settings.project_id.as_str();

        let existing: Vec<AlertPolicy> = self
            .service
            .list_policies(project_id)
            .await?
            .into_iter()
            .filter(|p| p.display_name == self.settings.display_name)
            .collect();
        info!(
            "Found {} existing alert policies named '{}'",
            existing.len(),
            self.settings.display_name
        );

        let mut names = existing.into_iter().filter_map(|p| {
            if p.name.is_none() {
                warn!("Skipping listed policy without a resource name");
            }
            p.name
        });

        let mut deleted = Vec::new();
        let target = match self.settings.strategy {
            ReplaceStrategy::DeleteThenCreate => None,
            ReplaceStrategy::Update => names.next(),
        };

        if let Some(name) = target {
            policy.name = Some(name);
            let updated = self.service.update_policy(&policy).await?;
            info!("Updated alert policy: {}", updated.name.as_deref().unwrap_or(""));

            for name in names {
                self.delete(&name).await?;
                deleted.push(name);
            }

            return Ok(PolicyOutcome {
                policy: updated,
                deleted,
                updated: true,
            });
        }

        for name in names {
            self.delete(&name).await?;
            deleted.push(name);
        }

        let created = self.service.create_policy(project_id, &policy).await?;
        info!(
            "Created alert policy: {}",
            created.name.as_deref().unwrap_or("")
        );

        Ok(PolicyOutcome {
            policy: created,
            deleted,
            updated: false,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), MonitoringError> {
        self.service.delete_policy(name).await?;
        info!("Deleted existing alert policy: {}", name);
        Ok(())
    }
}
