use thiserror::Error;

/// Errors that can occur while fetching the log pattern file
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GitHub token not found. Set it in the environment as GITHUB_TOKEN")]
    MissingToken,

    #[error("Invalid GitHub token: expected at least {min_len} characters")]
    InvalidToken { min_len: usize },

    #[error("File not found at: {url}. Check the repository, branch, or file path")]
    NotFound { url: String },

    #[error("Unauthorized. Check your token permissions")]
    Unauthorized,

    #[error("Failed to fetch file: {status}, {body}")]
    Http { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors that can occur while reading a log pattern document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Invalid JSON log pattern: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid log pattern: {0}")]
    Validation(String),
}

/// Errors returned by the Cloud Monitoring API or its credential lookup
#[derive(Error, Debug)]
pub enum MonitoringError {
    #[error("Monitoring API returned error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Failed to obtain cloud credentials: {0}")]
    Credentials(String),

    #[error("No log record carries a textPayload to build a condition from")]
    NoConditions,
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Missing required setting: {0}")]
    MissingValue(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Top-level error for one pipeline run
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Log pattern error: {0}")]
    Document(#[from] DocumentError),

    #[error("No error logs found in the provided JSON log pattern")]
    NoErrorLogs,

    #[error("Alert policy error: {0}")]
    Monitoring(#[from] MonitoringError),
}

impl AppError {
    /// Process exit status reported for this kind of failure
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Fetch(_) => 3,
            AppError::Document(_) | AppError::NoErrorLogs => 4,
            AppError::Monitoring(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_stages() {
        let codes = [
            AppError::Config(ConfigError::MissingValue("x".into())).exit_code(),
            AppError::Fetch(FetchError::Unauthorized).exit_code(),
            AppError::NoErrorLogs.exit_code(),
            AppError::Monitoring(MonitoringError::NoConditions).exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 5]);
        assert_eq!(
            AppError::Document(DocumentError::Validation("bad".into())).exit_code(),
            4
        );
    }

    #[test]
    fn test_no_error_logs_message() {
        let message = AppError::NoErrorLogs.to_string().to_lowercase();
        assert!(message.contains("no error logs found"));
    }

    #[test]
    fn test_fetch_messages_carry_details() {
        let not_found = FetchError::NotFound {
            url: "https://example.test/a/b/main/logs.json".to_string(),
        };
        assert!(not_found
            .to_string()
            .contains("https://example.test/a/b/main/logs.json"));

        let http = FetchError::Http {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(http.to_string().contains("503"));
        assert!(FetchError::Unauthorized
            .to_string()
            .to_lowercase()
            .contains("unauthorized"));
    }
}
