/// Error types for every pipeline stage
pub mod error;

/// Configuration management
pub mod config;

/// Log pattern document model
pub mod pattern;

/// Error filter derivation
pub mod filters;

/// Log pattern retrieval from source control
pub mod source;

/// Cloud Monitoring alert policies
pub mod alerts;

/// Fetch, derive and provision in one pass
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use error::{AppError, ConfigError, DocumentError, FetchError, MonitoringError};
