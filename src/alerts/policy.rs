//! Cloud Monitoring v3 alert policy model
//!
//! These types mirror the REST JSON representation of `AlertPolicy`. Only the
//! fields this tool writes are modelled; anything else on listed policies is
//! ignored when deserializing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Most log-match conditions Cloud Monitoring accepts on one policy
pub const LOG_MATCH_CONDITION_LIMIT: usize = 1;

/// How the results of multiple conditions are combined
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Combiner {
    And,
    Or,
    AndWithMatchingResource,
    /// Also used for combiner values this model does not know
    #[default]
    #[serde(rename = "COMBINE_UNSPECIFIED")]
    #[serde(other)]
    Unspecified,
}

/// Log-based condition body: fires when an entry matches `filter`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogMatch {
    pub filter: String,
}

/// One clause of an alert policy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Server-assigned resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_matched_log: Option<LogMatch>,
}

impl Condition {
    pub fn matched_log(display_name: String, filter: String) -> Self {
        Self {
            name: None,
            display_name,
            condition_matched_log: Some(LogMatch { filter }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRateLimit {
    /// Protobuf JSON duration, e.g. "3600s"
    pub period: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_rate_limit: Option<NotificationRateLimit>,
}

impl AlertStrategy {
    /// Strategy that sends at most one notification per `period`
    pub fn rate_limited(period: Duration) -> Self {
        Self {
            notification_rate_limit: Some(NotificationRateLimit {
                period: proto_duration(period),
            }),
        }
    }
}

/// An alert policy as stored by Cloud Monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertPolicy {
    /// `projects/{project}/alertPolicies/{id}`, assigned by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub combiner: Combiner,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_strategy: Option<AlertStrategy>,
}

impl AlertPolicy {
    /// Whether the API will refuse this policy for carrying too many log-match conditions
    pub fn exceeds_log_match_limit(&self) -> bool {
        self.conditions
            .iter()
            .filter(|c| c.condition_matched_log.is_some())
            .count()
            > LOG_MATCH_CONDITION_LIMIT
    }
}

/// Page of results from `alertPolicies.list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlertPoliciesResponse {
    #[serde(default)]
    pub alert_policies: Vec<AlertPolicy>,
    #[serde(default)]
    pub next_page_token: String,
}

/// Format a duration the way protobuf JSON encodes `google.protobuf.Duration`
pub fn proto_duration(duration: Duration) -> String {
    match duration.subsec_nanos() {
        0 => format!("{}s", duration.as_secs()),
        nanos => format!("{}.{:09}s", duration.as_secs(), nanos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_serializes_to_rest_shape() {
        let policy = AlertPolicy {
            name: None,
            display_name: "dac-analytics-api-alerts".to_string(),
            conditions: vec![Condition::matched_log(
                "Error Log Condition 1".to_string(),
                "SEARCH(\"boom\")".to_string(),
            )],
            combiner: Combiner::Or,
            notification_channels: vec!["projects/p/notificationChannels/1".to_string()],
            enabled: true,
            alert_strategy: Some(AlertStrategy::rate_limited(Duration::from_secs(3600))),
        };

        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(value["displayName"], "dac-analytics-api-alerts");
        assert_eq!(value["combiner"], "OR");
        assert_eq!(value["enabled"], true);
        assert_eq!(
            value["conditions"][0]["conditionMatchedLog"]["filter"],
            "SEARCH(\"boom\")"
        );
        assert_eq!(
            value["alertStrategy"]["notificationRateLimit"]["period"],
            "3600s"
        );
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_listed_policy_tolerates_unknown_shapes() {
        let json = r#"{
            "alertPolicies": [
                {
                    "name": "projects/p/alertPolicies/1",
                    "displayName": "cpu",
                    "combiner": "AND_WITH_MATCHING_RESOURCE",
                    "conditions": [
                        {"name": "c1", "displayName": "cpu > 90", "conditionThreshold": {"filter": "x"}}
                    ],
                    "creationRecord": {"mutateTime": "2024-01-01T00:00:00Z"}
                },
                {"name": "projects/p/alertPolicies/2", "displayName": "odd", "combiner": "SOMETHING_NEW"}
            ],
            "nextPageToken": "abc"
        }"#;

        let page: ListAlertPoliciesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.alert_policies.len(), 2);
        assert_eq!(page.next_page_token, "abc");

        let cpu = &page.alert_policies[0];
        assert_eq!(cpu.combiner, Combiner::AndWithMatchingResource);
        assert!(!cpu.enabled);
        assert!(cpu.conditions[0].condition_matched_log.is_none());
        assert_eq!(page.alert_policies[1].combiner, Combiner::Unspecified);
    }

    #[test]
    fn test_empty_list_response() {
        let page: ListAlertPoliciesResponse = serde_json::from_str("{}").unwrap();
        assert!(page.alert_policies.is_empty());
        assert!(page.next_page_token.is_empty());
    }

    #[test]
    fn test_log_match_limit() {
        let condition = |n: usize| {
            Condition::matched_log(format!("c{}", n), format!("SEARCH(\"{}\")", n))
        };
        let mut policy = AlertPolicy {
            conditions: vec![condition(1)],
            ..AlertPolicy::default()
        };
        assert!(!policy.exceeds_log_match_limit());

        policy.conditions.push(Condition {
            display_name: "threshold".to_string(),
            ..Condition::default()
        });
        assert!(!policy.exceeds_log_match_limit());

        policy.conditions.push(condition(2));
        assert!(policy.exceeds_log_match_limit());
    }

    #[test]
    fn test_proto_duration() {
        assert_eq!(proto_duration(Duration::from_secs(3600)), "3600s");
        assert_eq!(proto_duration(Duration::from_millis(1500)), "1.500000000s");
    }
}
