//! Log pattern document types
//!
//! A log pattern document is the JSON file kept in the application repository
//! that lists sample log entries. Only the `logs` array is read; each record
//! may carry a `severity` and a `textPayload`.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

/// A single sample log entry from the pattern document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Cloud Logging severity name, e.g. "DEFAULT" or "ERROR"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Free-text payload of the log entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<String>,
}

impl LogRecord {
    pub fn new(severity: Option<&str>, text_payload: Option<&str>) -> Self {
        Self {
            severity: severity.map(str::to_string),
            text_payload: text_payload.map(str::to_string),
        }
    }

    /// The payload text, if present and not empty
    pub fn payload(&self) -> Option<&str> {
        self.text_payload.as_deref().filter(|text| !text.is_empty())
    }

    /// Whether this record has the given severity and carries a payload
    pub fn qualifies(&self, severity: &str) -> bool {
        self.severity.as_deref() == Some(severity) && self.payload().is_some()
    }
}

/// Parsed log pattern document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogPattern {
    pub logs: Vec<LogRecord>,
}

impl LogPattern {
    /// Parse a log pattern document from raw JSON text
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Parse` for malformed JSON and
    /// `DocumentError::Validation` when `logs` is missing, is not an array,
    /// or contains a record of the wrong shape.
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        let entries = value
            .get("logs")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| {
                DocumentError::Validation("missing 'logs' array or it is not a list".to_string())
            })?;

        let logs = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                LogRecord::deserialize(entry).map_err(|e| {
                    DocumentError::Validation(format!("log record {} is malformed: {}", idx + 1, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { logs })
    }

    /// Records with the given severity that carry a payload
    pub fn qualifying<'a>(&'a self, severity: &'a str) -> impl Iterator<Item = &'a LogRecord> + 'a {
        self.logs.iter().filter(move |record| record.qualifies(severity))
    }
}
