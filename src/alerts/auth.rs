use crate::config::MonitoringConfig;
use crate::error::MonitoringError;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// OAuth2 scope requested for service account tokens
pub const MONITORING_SCOPE: &str = "https://www.googleapis.com/auth/monitoring";
/// Lifetime of a signed assertion; Google accepts at most one hour
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Source of the OAuth2 access token used against Cloud Monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A token minted elsewhere, e.g. `gcloud auth print-access-token`
    AccessToken(String),
    /// User credentials written by `gcloud auth application-default login`
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_uri: String,
    },
    /// Service account key file, exchanged through a signed RS256 assertion
    ServiceAccount {
        client_email: String,
        private_key: String,
        token_uri: String,
    },
    /// The GCE / Cloud Run metadata server
    MetadataServer { url: String },
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Claims of the JWT bearer assertion sent to the token endpoint
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

fn signing_key(private_key: &str) -> Result<EncodingKey, MonitoringError> {
    EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| MonitoringError::Credentials(format!("invalid private_key: {}", e)))
}

/// Sign the assertion a service account trades for an access token
fn signed_assertion(
    client_email: &str,
    private_key: &str,
    token_uri: &str,
) -> Result<String, MonitoringError> {
    let key = signing_key(private_key)?;
    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: client_email.to_string(),
        scope: MONITORING_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| MonitoringError::Credentials(format!("cannot sign assertion: {}", e)))
}

impl Credentials {
    /// Pick credentials in order: explicit token, credentials file, metadata server
    pub fn resolve(config: &MonitoringConfig) -> Result<Self, MonitoringError> {
        if let Some(token) = &config.access_token {
            debug!("Using access token from environment");
            return Ok(Credentials::AccessToken(token.clone()));
        }
        if let Some(path) = &config.credentials_file {
            return Self::from_file(path);
        }
        debug!("No credentials configured, falling back to the metadata server");
        Ok(Credentials::MetadataServer {
            url: METADATA_TOKEN_URL.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, MonitoringError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MonitoringError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Interpret the contents of an application-default credentials file
    pub fn from_json(contents: &str) -> Result<Self, MonitoringError> {
        let file: CredentialsFile = serde_json::from_str(contents)
            .map_err(|e| MonitoringError::Credentials(format!("invalid credentials file: {}", e)))?;

        let field = |value: Option<String>, name: &str| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                MonitoringError::Credentials(format!("credentials file lacks {}", name))
            })
        };
        let token_uri = file
            .token_uri
            .unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string());

        match file.kind.as_str() {
            "authorized_user" => Ok(Credentials::AuthorizedUser {
                client_id: field(file.client_id, "client_id")?,
                client_secret: field(file.client_secret, "client_secret")?,
                refresh_token: field(file.refresh_token, "refresh_token")?,
                token_uri,
            }),
            "service_account" => {
                let private_key = field(file.private_key, "private_key")?;
                signing_key(&private_key)?;
                Ok(Credentials::ServiceAccount {
                    client_email: field(file.client_email, "client_email")?,
                    private_key,
                    token_uri,
                })
            }
            other => Err(MonitoringError::Credentials(format!(
                "unsupported credentials type '{}'",
                other
            ))),
        }
    }

    /// Obtain a bearer token for the Monitoring API
    pub async fn access_token(&self, client: &Client) -> Result<String, MonitoringError> {
        let response = match self {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => {
                info!("Refreshing user access token");
                client
                    .post(token_uri)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("refresh_token", refresh_token.as_str()),
                    ])
                    .send()
                    .await?
            }
            Credentials::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => {
                info!("Exchanging service account assertion for {}", client_email);
                let assertion = signed_assertion(client_email, private_key, token_uri)?;
                client
                    .post(token_uri)
                    .form(&[
                        ("grant_type", JWT_BEARER_GRANT),
                        ("assertion", assertion.as_str()),
                    ])
                    .send()
                    .await?
            }
            Credentials::MetadataServer { url } => {
                info!("Requesting access token from the metadata server");
                client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MonitoringError::Credentials(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            MonitoringError::InvalidResponse(format!("Failed to parse token response: {}", e))
        })?;
        Ok(token.access_token)
    }
}
