//! Retrieval of the log pattern file from source control
pub mod github;

pub use github::{GitHubFetcher, MIN_TOKEN_LEN};

use crate::config::SourceConfig;
use crate::error::FetchError;
use std::future::Future;
use std::pin::Pin;

/// Identifies one file at one branch of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl From<&SourceConfig> for FileLocation {
    fn from(source: &SourceConfig) -> Self {
        Self {
            owner: source.owner.clone(),
            repo: source.repo.clone(),
            branch: source.branch.clone(),
            path: source.path.clone(),
        }
    }
}

/// Trait for anything that can hand back the raw text of a repository file
pub trait FileSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        location: &'a FileLocation,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;
}
