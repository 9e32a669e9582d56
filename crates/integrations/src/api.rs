//! Outbound API call dispatch.
//!
//! [`ApiDispatcher`] orchestrates one tenant-to-external-API call: lookup,
//! rate admission, header assembly, auth, and the bounded retry loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use flowdesk_core::connections::{clamp_api_timeout_ms, Connection, DEFAULT_TIMEOUT_MS};
use flowdesk_core::http::HttpMethod;
use flowdesk_core::types::{DbId, TenantId, Timestamp};

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::executor::{OutboundRequest, RequestExecutor, CONTENT_TYPE_JSON};
use crate::rate_limit::RateLimiter;
use crate::retry::run_with_retry;
use crate::store::IntegrationStore;

// ---------------------------------------------------------------------------
// ApiRequest
// ---------------------------------------------------------------------------

/// One outbound call against a registered connection.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub connection_id: DbId,
    /// Path appended to the connection's base URL.
    pub endpoint: String,
    pub method: HttpMethod,
    /// Call-site headers; these win over the connection's defaults.
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the connection's configured timeout when set.
    pub timeout_ms: Option<u64>,
}

impl ApiRequest {
    /// A GET of `endpoint` with no overrides.
    pub fn new(connection_id: DbId, endpoint: impl Into<String>) -> Self {
        Self {
            connection_id,
            endpoint: endpoint.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
            timeout_ms: None,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Structured result of an API dispatch that entered the retry loop.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    /// Response body, parsed as JSON when possible, else the raw text.
    pub data: Option<Value>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub elapsed_ms: u64,
    /// Attempts actually made beyond the first.
    pub retry_count: u32,
    pub error: Option<String>,
}

/// Result of a registration-time connectivity probe.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub tested_at: Timestamp,
}

// ---------------------------------------------------------------------------
// ApiDispatcher
// ---------------------------------------------------------------------------

/// Dispatches tenant API calls through rate limiting, auth, and retries.
///
/// Constructed explicitly with its dependencies; shares nothing globally.
pub struct ApiDispatcher {
    store: Arc<dyn IntegrationStore>,
    executor: RequestExecutor,
    limiter: Arc<dyn RateLimiter>,
    config: DispatchConfig,
}

impl ApiDispatcher {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        executor: RequestExecutor,
        limiter: Arc<dyn RateLimiter>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            executor,
            limiter,
            config,
        }
    }

    /// Execute one API call for `tenant_id`.
    ///
    /// Pre-flight failures (unknown/inactive/foreign connection, rate
    /// admission, store errors) return `Err` without consuming a retry
    /// attempt or touching usage counters. A call that enters the retry
    /// loop always returns `Ok(ApiResponse)` and updates the connection's
    /// usage counters exactly once, whatever the outcome.
    pub async fn execute(
        &self,
        tenant_id: TenantId,
        request: ApiRequest,
    ) -> Result<ApiResponse, DispatchError> {
        let started = Instant::now();

        let connection = self
            .store
            .get_connection(tenant_id, request.connection_id)
            .await?
            .ok_or(DispatchError::NotFound {
                entity: "connection",
                id: request.connection_id,
            })?;

        let decision = self
            .limiter
            .check(connection.id, connection.rate_limit.requests_per_minute);
        if !decision.allowed {
            tracing::warn!(
                connection_id = connection.id,
                retry_after_secs = decision.retry_after_secs,
                "API call denied by rate limiter"
            );
            return Err(DispatchError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let outbound = self.build_request(&connection, &request);
        let outcome = run_with_retry(&connection.retry, |_| self.executor.execute(&outbound)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let success = outcome.result.is_ok();
        if let Err(error) = self
            .store
            .increment_connection_usage(connection.id, success)
            .await
        {
            tracing::warn!(
                connection_id = connection.id,
                error = %error,
                "Failed to update connection usage counters"
            );
        }

        Ok(match outcome.result {
            Ok(response) => {
                tracing::debug!(
                    connection_id = connection.id,
                    status = response.status,
                    retries = outcome.retries,
                    elapsed_ms,
                    "API call succeeded"
                );
                let data = response.json().or_else(|| {
                    if response.body.is_empty() {
                        None
                    } else {
                        Some(Value::String(
                            String::from_utf8_lossy(&response.body).to_string(),
                        ))
                    }
                });
                ApiResponse {
                    success: true,
                    data,
                    status: Some(response.status),
                    status_text: Some(response.status_text),
                    elapsed_ms,
                    retry_count: outcome.retries,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(
                    connection_id = connection.id,
                    retries = outcome.retries,
                    error = %error.message(),
                    "API call failed"
                );
                ApiResponse {
                    success: false,
                    data: None,
                    status: error.status(),
                    status_text: None,
                    elapsed_ms,
                    retry_count: outcome.retries,
                    error: Some(error.message()),
                }
            }
        })
    }

    /// Probe a connection definition with a single GET of its base URL.
    ///
    /// Used at registration time, before the row exists; no rate limit,
    /// no retries, no counter updates.
    pub async fn test_connection(&self, connection: &Connection) -> ConnectionTestResult {
        let probe = ApiRequest::new(connection.id, "");
        let request = self.build_request(connection, &probe);
        let attempt = self.executor.execute(&request).await;

        match attempt.outcome {
            Ok(response) if response.is_success() => ConnectionTestResult {
                success: true,
                status: Some(response.status),
                elapsed_ms: attempt.elapsed_ms,
                error: None,
                tested_at: Utc::now(),
            },
            Ok(response) => ConnectionTestResult {
                success: false,
                status: Some(response.status),
                elapsed_ms: attempt.elapsed_ms,
                error: Some(response.error_message()),
                tested_at: Utc::now(),
            },
            Err(error) => ConnectionTestResult {
                success: false,
                status: None,
                elapsed_ms: attempt.elapsed_ms,
                error: Some(error.to_string()),
                tested_at: Utc::now(),
            },
        }
    }

    /// Assemble the outbound request: engine headers first, then the
    /// connection's defaults, then call-site headers (call site wins),
    /// then auth injection over the serialized body.
    fn build_request(&self, connection: &Connection, request: &ApiRequest) -> OutboundRequest {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        headers.insert("User-Agent".to_string(), self.config.user_agent.clone());
        for (name, value) in &connection.default_headers {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        let body = request
            .body
            .as_ref()
            .map(|value| serde_json::to_vec(value).expect("JSON value serializes"));
        connection
            .auth
            .apply(&mut headers, body.as_deref().unwrap_or_default());

        let timeout_ms = match request.timeout_ms {
            Some(ms) => clamp_api_timeout_ms(ms),
            None if connection.timeout_ms > 0 => connection.timeout_ms,
            None => DEFAULT_TIMEOUT_MS,
        };

        OutboundRequest {
            method: request.method,
            url: join_url(&connection.base_url, &request.endpoint),
            headers,
            query: request.query.clone(),
            body,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// Join a base URL and an endpoint path without doubling slashes.
fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://api.example.com", "/v1/users"),
            "https://api.example.com/v1/users"
        );
        assert_eq!(
            join_url("https://api.example.com/", "v1/users"),
            "https://api.example.com/v1/users"
        );
        assert_eq!(
            join_url("https://api.example.com/base/", "/v1"),
            "https://api.example.com/base/v1"
        );
    }

    #[test]
    fn join_url_empty_endpoint_is_base() {
        assert_eq!(
            join_url("https://api.example.com", ""),
            "https://api.example.com"
        );
    }

    #[test]
    fn api_request_builder_accumulates() {
        let request = ApiRequest::new(5, "/v1/items")
            .with_method(HttpMethod::Post)
            .with_header("X-Trace", "abc")
            .with_query("page", "2")
            .with_body(serde_json::json!({"name": "widget"}))
            .with_timeout_ms(5_000);
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers.get("X-Trace").map(String::as_str), Some("abc"));
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert!(request.body.is_some());
        assert_eq!(request.timeout_ms, Some(5_000));
    }
}
