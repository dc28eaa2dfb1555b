use crate::error::FetchError;
use crate::source::{FileLocation, FileSource};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Shortest token accepted before any request is attempted
pub const MIN_TOKEN_LEN: usize = 20;

/// Fetches files from private GitHub repositories through the raw content host
///
/// Every fetch is a single authenticated GET; there are no retries and no caching.
pub struct GitHubFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubFetcher {
    /// Create a fetcher for `https://raw.githubusercontent.com`
    pub fn new(token: Option<String>) -> Result<Self, FetchError> {
        Self::with_base_url(token, "https://raw.githubusercontent.com".to_string())
    }

    /// Create a fetcher for a custom raw content host
    ///
    /// This allows GitHub Enterprise hosts or a local test server.
    pub fn with_base_url(token: Option<String>, base_url: String) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Create a fetcher around an existing HTTP client
    pub fn with_client(client: Client, base_url: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    /// Raw content URL for a file location
    pub fn raw_url(&self, location: &FileLocation) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            location.owner,
            location.repo,
            location.branch,
            location.path.trim_start_matches('/')
        )
    }

    fn checked_token(&self) -> Result<&str, FetchError> {
        match self.token.as_deref() {
            None | Some("") => Err(FetchError::MissingToken),
            Some(token) if token.len() < MIN_TOKEN_LEN => Err(FetchError::InvalidToken {
                min_len: MIN_TOKEN_LEN,
            }),
            Some(token) => Ok(token),
        }
    }

    /// Fetch the raw text of a file
    ///
    /// # Errors
    ///
    /// * `FetchError::MissingToken` / `FetchError::InvalidToken` before any request
    /// * `FetchError::NotFound` on 404, naming the requested URL
    /// * `FetchError::Unauthorized` on 401
    /// * `FetchError::Http` on any other status but 200
    pub async fn fetch_file(&self, location: &FileLocation) -> Result<String, FetchError> {
        let token = self.checked_token()?;
        let url = self.raw_url(location);
        debug!("Requesting {}", url);

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                info!("Fetched {} ({} bytes)", location.path, body.len());
                Ok(body)
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound { url }),
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(FetchError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

impl FileSource for GitHubFetcher {
    fn fetch<'a>(
        &'a self,
        location: &'a FileLocation,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(self.fetch_file(location))
    }
}
