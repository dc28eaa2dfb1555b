use crate::alerts::auth::Credentials;
use crate::alerts::policy::{AlertPolicy, ListAlertPoliciesResponse};
use crate::error::MonitoringError;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by `AlertPolicyService` operations
pub type ServiceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, MonitoringError>> + Send + 'a>>;

/// Trait for the alert policy operations of a monitoring service
pub trait AlertPolicyService: Send + Sync {
    /// All alert policies in `projects/{project_id}`
    fn list_policies<'a>(&'a self, project_id: &'a str) -> ServiceFuture<'a, Vec<AlertPolicy>>;

    /// Delete a policy by its resource name
    fn delete_policy<'a>(&'a self, name: &'a str) -> ServiceFuture<'a, ()>;

    /// Create a policy and return it as stored
    fn create_policy<'a>(
        &'a self,
        project_id: &'a str,
        policy: &'a AlertPolicy,
    ) -> ServiceFuture<'a, AlertPolicy>;

    /// Replace the policy named by `policy.name` wholesale
    fn update_policy<'a>(&'a self, policy: &'a AlertPolicy) -> ServiceFuture<'a, AlertPolicy>;
}

/// Error envelope returned by Google APIs
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Cloud Monitoring v3 REST client
pub struct MonitoringClient {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl MonitoringClient {
    /// Build a client, obtaining an access token from `credentials`
    pub async fn connect(
        endpoint: String,
        credentials: &Credentials,
    ) -> Result<Self, MonitoringError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let access_token = credentials.access_token(&client).await?;
        Ok(Self::with_client(client, endpoint, access_token))
    }

    /// Create a client around an existing HTTP client and token
    pub fn with_client(client: Client, endpoint: String, access_token: String) -> Self {
        Self {
            client,
            endpoint,
            access_token,
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v3/{}", self.endpoint.trim_end_matches('/'), resource)
    }

    fn policies_url(&self, project_id: &str) -> String {
        self.url(&format!("projects/{}/alertPolicies", project_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, MonitoringError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = match serde_json::from_str::<ApiErrorEnvelope>(&body) {
            Ok(envelope) if !envelope.error.status.is_empty() => {
                format!("{} ({})", envelope.error.message, envelope.error.status)
            }
            Ok(envelope) => envelope.error.message,
            Err(_) => body,
        };
        Err(MonitoringError::Api { status, message })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, MonitoringError> {
        response.json().await.map_err(|e| {
            MonitoringError::InvalidResponse(format!("Failed to parse Monitoring response: {}", e))
        })
    }

    pub async fn list(&self, project_id: &str) -> Result<Vec<AlertPolicy>, MonitoringError> {
        let mut policies = Vec::new();
        let mut page_token = String::new();
        let mut seen_tokens = HashSet::new();

        loop {
            let mut request = self.client.get(self.policies_url(project_id));
            if !page_token.is_empty() {
                request = request.query(&[("pageToken", page_token.as_str())]);
            }
            let page: ListAlertPoliciesResponse = Self::decode(self.send(request).await?).await?;
            debug!("Listed {} alert policies", page.alert_policies.len());
            policies.extend(page.alert_policies);

            if page.next_page_token.is_empty() {
                return Ok(policies);
            }
            if !seen_tokens.insert(page.next_page_token.clone()) {
                return Err(MonitoringError::InvalidResponse(format!(
                    "alert policy listing repeated page token '{}'",
                    page.next_page_token
                )));
            }
            page_token = page.next_page_token;
        }
    }

    pub async fn delete(&self, name: &str) -> Result<(), MonitoringError> {
        self.send(self.client.delete(self.url(name))).await?;
        Ok(())
    }

    pub async fn create(
        &self,
        project_id: &str,
        policy: &AlertPolicy,
    ) -> Result<AlertPolicy, MonitoringError> {
        let request = self.client.post(self.policies_url(project_id)).json(policy);
        Self::decode(self.send(request).await?).await
    }

    pub async fn update(&self, policy: &AlertPolicy) -> Result<AlertPolicy, MonitoringError> {
        let name = policy.name.as_deref().ok_or_else(|| {
            MonitoringError::InvalidResponse("cannot update a policy without a name".to_string())
        })?;
        // An empty update mask replaces the whole policy.
        let request = self.client.patch(self.url(name)).json(policy);
        Self::decode(self.send(request).await?).await
    }
}

impl AlertPolicyService for MonitoringClient {
    fn list_policies<'a>(&'a self, project_id: &'a str) -> ServiceFuture<'a, Vec<AlertPolicy>> {
        Box::pin(self.list(project_id))
    }

    fn delete_policy<'a>(&'a self, name: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(self.delete(name))
    }

    fn create_policy<'a>(
        &'a self,
        project_id: &'a str,
        policy: &'a AlertPolicy,
    ) -> ServiceFuture<'a, AlertPolicy> {
        Box::pin(self.create(project_id, policy))
    }

    fn update_policy<'a>(&'a self, policy: &'a AlertPolicy) -> ServiceFuture<'a, AlertPolicy> {
        Box::pin(self.update(policy))
    }
}
