//! Error filter derivation
//!
//! Reduces the qualifying records of a log pattern document to a deduplicated
//! set of Cloud Logging filter expressions scoped to one Cloud Run service.

use crate::error::DocumentError;
use crate::pattern::LogPattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How a qualifying record is turned into a filter expression
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// The resource scope alone; every qualifying record yields the same filter
    #[default]
    Fixed,
    /// The resource scope narrowed by a `SEARCH` on the record's payload
    PerPayload,
}

/// Settings for filter derivation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: FilterMode,
    /// Severity value that marks a record as an error entry
    pub severity: String,
    pub resource_type: String,
    pub service_name: String,
    pub location: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::Fixed,
            severity: "DEFAULT".to_string(),
            resource_type: "cloud_run_revision".to_string(),
            service_name: "dac-analytics-api".to_string(),
            location: "europe-west4".to_string(),
        }
    }
}

/// A Cloud Logging filter expression
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorFilter(String);

impl ErrorFilter {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape text for use inside a double-quoted logging query string
pub fn quote_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// `SEARCH("...")` expression matching entries that contain `payload`
pub fn search_expression(payload: &str) -> String {
    format!("SEARCH({})", quote_literal(payload))
}

impl FilterConfig {
    fn resource_scope(&self) -> String {
        format!(
            "resource.type={} AND resource.labels.service_name={} AND resource.labels.location={}",
            quote_literal(&self.resource_type),
            quote_literal(&self.service_name),
            quote_literal(&self.location)
        )
    }

    fn filter_for(&self, payload: &str) -> ErrorFilter {
        match self.mode {
            FilterMode::Fixed => ErrorFilter(self.resource_scope()),
            FilterMode::PerPayload => ErrorFilter(format!(
                "{} AND {}",
                self.resource_scope(),
                search_expression(payload)
            )),
        }
    }
}

/// Derive the deduplicated error filters for an already parsed document
pub fn error_filters(pattern: &LogPattern, config: &FilterConfig) -> Vec<ErrorFilter> {
    pattern
        .qualifying(&config.severity)
        .filter_map(|record| record.payload())
        .map(|payload| config.filter_for(payload))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse raw document text and derive its error filters
///
/// # Errors
///
/// Returns `DocumentError` when the text is not a valid log pattern document.
pub fn derive_error_filters(
    raw: &str,
    config: &FilterConfig,
) -> Result<Vec<ErrorFilter>, DocumentError> {
    let pattern = LogPattern::parse(raw)?;
    Ok(error_filters(&pattern, config))
}
