//! Outbound HTTP request execution.
//!
//! [`HttpTransport`] abstracts the HTTP client so dispatch logic can be
//! exercised with scripted doubles; [`ReqwestTransport`] is the production
//! implementation with a hard per-request timeout. [`RequestExecutor`]
//! wraps a transport and measures wall-clock latency per attempt. No
//! bookkeeping happens here — counters and logs are the dispatchers'
//! responsibility.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use flowdesk_core::http::HttpMethod;

/// Content type attached to every outbound JSON body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A fully-assembled outbound request, ready to send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// A completed HTTP exchange, regardless of status code.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl OutboundResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Human-readable failure description.
    ///
    /// Prefers a `message` or `error` field from a JSON body, falling back
    /// to the status line.
    pub fn error_message(&self) -> String {
        if let Some(value) = self.json() {
            for key in ["message", "error"] {
                if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                    return text.to_string();
                }
            }
        }
        if self.status_text.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            format!("HTTP {} {}", self.status, self.status_text)
        }
    }
}

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Network-level failure, classified for retry decisions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The hard per-request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure: refused, reset, or unresolvable host.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Anything else — malformed URL, invalid header, protocol error.
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures are worth retrying; a request we
    /// could not even assemble is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection(_))
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// One-shot HTTP exchange.
///
/// Any response, whatever its status, is `Ok`; `Err` is reserved for
/// failures that produced no HTTP response at all.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse, TransportError>;
}

/// Production transport over a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        Ok(OutboundResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

// ---------------------------------------------------------------------------
// RequestExecutor
// ---------------------------------------------------------------------------

/// One measured attempt.
#[derive(Debug)]
pub struct ExecutedAttempt {
    pub outcome: Result<OutboundResponse, TransportError>,
    pub elapsed_ms: u64,
}

/// Executes single attempts through an injected transport and captures
/// wall-clock latency from just before the call until the response (or
/// error) is available.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Executor over the production reqwest transport.
    pub fn with_default_transport() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }

    pub async fn execute(&self, request: &OutboundRequest) -> ExecutedAttempt {
        let started = Instant::now();
        let outcome = self.transport.send(request).await;
        ExecutedAttempt {
            outcome,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
