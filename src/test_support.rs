//! Loopback HTTP responder for exercising the HTTP clients in tests
//!
//! Serves a fixed list of canned responses, one per connection, in order, and
//! records every request it receives.

use crate::alerts::{AlertPolicy, AlertPolicyService, ServiceFuture};
use crate::error::{FetchError, MonitoringError};
use crate::source::{FileLocation, FileSource};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Start a responder on an ephemeral port and return its base URL
pub async fn spawn_responder(responses: Vec<CannedResponse>) -> (String, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&recorded);

    tokio::spawn(async move {
        for response in responses {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            if let Some(request) = read_request(&mut stream).await {
                log.lock().unwrap().push(request);
            }
            let reply = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                response.status,
                response.body.len(),
                response.body
            );
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), recorded)
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// HTTP client that never goes through a proxy, for talking to the responder
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// In-memory stand-in for the Cloud Monitoring alert policy API
///
/// Keeps the project's policies in a vector and counts calls per operation.
#[derive(Default)]
pub struct FakePolicyService {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    policies: Vec<AlertPolicy>,
    next_id: u32,
    list_calls: usize,
    delete_calls: usize,
    create_calls: usize,
    update_calls: usize,
    fail_create: bool,
}

impl FakePolicyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored policy with a generated resource name
    pub fn with_policy(self, display_name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let policy = AlertPolicy {
                name: Some(format!("projects/test-project/alertPolicies/{}", state.next_id)),
                display_name: display_name.to_string(),
                ..Default::default()
            };
            state.policies.push(policy);
        }
        self
    }

    /// Make every create call fail with a 500
    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    pub fn policies(&self) -> Vec<AlertPolicy> {
        self.state.lock().unwrap().policies.clone()
    }

    pub fn named(&self, display_name: &str) -> Vec<AlertPolicy> {
        self.policies()
            .into_iter()
            .filter(|p| p.display_name == display_name)
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }
}

fn not_found(name: &str) -> MonitoringError {
    MonitoringError::Api {
        status: 404,
        message: format!("policy {} not found", name),
    }
}

impl AlertPolicyService for FakePolicyService {
    fn list_policies<'a>(
        &'a self,
        _project_id: &'a str,
    ) -> ServiceFuture<'a, Vec<AlertPolicy>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;
            Ok(state.policies.clone())
        })
    }

    fn delete_policy<'a>(
        &'a self,
        name: &'a str,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.delete_calls += 1;
            let before = state.policies.len();
            state.policies.retain(|p| p.name.as_deref() != Some(name));
            if state.policies.len() == before {
                return Err(not_found(name));
            }
            Ok(())
        })
    }

    fn create_policy<'a>(
        &'a self,
        project_id: &'a str,
        policy: &'a AlertPolicy,
    ) -> ServiceFuture<'a, AlertPolicy> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;
            if state.fail_create {
                return Err(MonitoringError::Api {
                    status: 500,
                    message: "internal error".to_string(),
                });
            }
            state.next_id += 1;
            let mut stored = policy.clone();
            stored.name = Some(format!(
                "projects/{}/alertPolicies/{}",
                project_id, state.next_id
            ));
            state.policies.push(stored.clone());
            Ok(stored)
        })
    }

    fn update_policy<'a>(
        &'a self,
        policy: &'a AlertPolicy,
    ) -> ServiceFuture<'a, AlertPolicy> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.update_calls += 1;
            let name = policy.name.clone().unwrap_or_default();
            match state
                .policies
                .iter_mut()
                .find(|p| p.name.as_deref() == Some(name.as_str()))
            {
                Some(slot) => {
                    *slot = policy.clone();
                    Ok(policy.clone())
                }
                None => Err(not_found(&name)),
            }
        })
    }
}

/// File source that serves a fixed result and counts fetches
pub struct StaticSource {
    result: Option<String>,
    fetches: Mutex<usize>,
}

impl StaticSource {
    pub fn text(body: &str) -> Self {
        Self {
            result: Some(body.to_string()),
            fetches: Mutex::new(0),
        }
    }

    /// Source that answers every fetch with a 404 for the requested location
    pub fn missing() -> Self {
        Self {
            result: None,
            fetches: Mutex::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

impl FileSource for StaticSource {
    fn fetch<'a>(
        &'a self,
        location: &'a FileLocation,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            *self.fetches.lock().unwrap() += 1;
            match &self.result {
                Some(body) => Ok(body.clone()),
                None => Err(FetchError::NotFound {
                    url: format!("static://{}/{}", location.repo, location.path),
                }),
            }
        })
    }
}
