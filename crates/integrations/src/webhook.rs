//! Webhook delivery dispatch.
//!
//! [`WebhookDispatcher`] delivers one event to one registered webhook: the
//! canonical envelope is built and serialized exactly once, signed over
//! those exact bytes, and resent unchanged on every retry. Exactly one
//! delivery log row is written per dispatch that resolved a webhook, after
//! the retry loop terminates.
//!
//! Webhook delivery is not rate-limited: the limiter protects our quota
//! against third-party APIs we call, while webhooks push to endpoints the
//! tenant owns and are bounded by retry backoff instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

use flowdesk_core::connections::DEFAULT_TIMEOUT_MS;
use flowdesk_core::delivery::{DeliveryRecord, DeliveryStatus};
use flowdesk_core::types::{DbId, TenantId, Timestamp};
use flowdesk_core::webhooks::{TriggerEvent, Webhook, WebhookEnvelope};

use crate::config::DispatchConfig;
use crate::executor::{OutboundRequest, RequestExecutor, CONTENT_TYPE_JSON};
use crate::retry::{run_with_retry, RetryOutcome};
use crate::store::IntegrationStore;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Structured result of one webhook dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub elapsed_ms: u64,
    /// Attempts actually made beyond the first.
    pub retry_count: u32,
    pub webhook_id: DbId,
    pub event_type: String,
    pub error: Option<String>,
}

impl WebhookResponse {
    pub(crate) fn failure(
        webhook_id: DbId,
        event: TriggerEvent,
        elapsed_ms: u64,
        error: String,
    ) -> Self {
        Self {
            success: false,
            status: None,
            status_text: None,
            elapsed_ms,
            retry_count: 0,
            webhook_id,
            event_type: event.as_str().to_string(),
            error: Some(error),
        }
    }
}

/// Result of a registration-time trial delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookTestResult {
    pub success: bool,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub tested_at: Timestamp,
}

// ---------------------------------------------------------------------------
// WebhookDispatcher
// ---------------------------------------------------------------------------

/// Delivers events to registered webhook receivers.
pub struct WebhookDispatcher {
    store: Arc<dyn IntegrationStore>,
    executor: RequestExecutor,
    config: DispatchConfig,
}

impl WebhookDispatcher {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        executor: RequestExecutor,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
        }
    }

    /// Deliver `event` to one webhook of `tenant_id`.
    ///
    /// Every failure — lookup, validation, delivery — is captured in the
    /// returned result; nothing escapes this boundary, which is what keeps
    /// fan-out isolation intact.
    pub async fn execute(
        &self,
        tenant_id: TenantId,
        webhook_id: DbId,
        event: TriggerEvent,
        payload: Value,
        metadata: Map<String, Value>,
    ) -> WebhookResponse {
        let started = Instant::now();

        let webhook = match self.store.get_webhook(tenant_id, webhook_id).await {
            Ok(Some(webhook)) => webhook,
            Ok(None) => {
                return WebhookResponse::failure(
                    webhook_id,
                    event,
                    started.elapsed().as_millis() as u64,
                    format!("webhook {webhook_id} not found or inactive"),
                );
            }
            Err(error) => {
                tracing::error!(webhook_id, error = %error, "Webhook lookup failed");
                return WebhookResponse::failure(
                    webhook_id,
                    event,
                    started.elapsed().as_millis() as u64,
                    error.to_string(),
                );
            }
        };

        // Caller bug, not retried; still leaves an audit row.
        if !webhook.subscribes_to(event) {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let message = format!(
                "webhook '{}' is not subscribed to event '{event}'",
                webhook.name
            );
            self.write_log(&DeliveryRecord {
                webhook_id: webhook.id,
                event_type: event.as_str().to_string(),
                payload,
                response: json!({ "error": message }),
                status: DeliveryStatus::Failed,
                response_time_ms: elapsed_ms,
                retry_count: 0,
                error_message: Some(message.clone()),
            })
            .await;
            return WebhookResponse::failure(webhook.id, event, elapsed_ms, message);
        }

        let envelope = WebhookEnvelope::new(
            event.as_str(),
            tenant_id,
            webhook.id,
            &self.config.source,
            payload,
            metadata,
        );
        let outcome = self.deliver(&webhook, &envelope).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let success = outcome.result.is_ok();
        if let Err(error) = self
            .store
            .increment_webhook_counters(webhook.id, success)
            .await
        {
            tracing::warn!(
                webhook_id = webhook.id,
                error = %error,
                "Failed to update webhook counters"
            );
        }

        let (status, status_text, error_message, response_summary) = match &outcome.result {
            Ok(response) => (
                Some(response.status),
                Some(response.status_text.clone()),
                None,
                json!({ "status": response.status, "statusText": response.status_text }),
            ),
            Err(error) => (
                error.status(),
                None,
                Some(error.message()),
                json!({ "status": error.status(), "error": error.message() }),
            ),
        };

        self.write_log(&DeliveryRecord {
            webhook_id: webhook.id,
            event_type: event.as_str().to_string(),
            payload: serde_json::to_value(&envelope).expect("envelope serializes to JSON"),
            response: response_summary,
            status: if success {
                DeliveryStatus::Success
            } else {
                DeliveryStatus::Failed
            },
            response_time_ms: elapsed_ms,
            retry_count: outcome.retries,
            error_message: error_message.clone(),
        })
        .await;

        if success {
            tracing::info!(
                webhook_id = webhook.id,
                event = %event,
                retries = outcome.retries,
                elapsed_ms,
                "Webhook delivered"
            );
        } else {
            tracing::warn!(
                webhook_id = webhook.id,
                event = %event,
                retries = outcome.retries,
                error = error_message.as_deref().unwrap_or(""),
                "Webhook delivery failed"
            );
        }

        WebhookResponse {
            success,
            status,
            status_text,
            elapsed_ms,
            retry_count: outcome.retries,
            webhook_id: webhook.id,
            event_type: event.as_str().to_string(),
            error: error_message,
        }
    }

    /// Trial delivery used at registration time: one attempt of a
    /// `webhook_test` envelope, no retries, no counters, no log row.
    pub async fn test(&self, tenant_id: TenantId, webhook: &Webhook) -> WebhookTestResult {
        let mut metadata = Map::new();
        metadata.insert("test".to_string(), Value::Bool(true));
        let envelope = WebhookEnvelope::new(
            "webhook_test",
            tenant_id,
            webhook.id,
            &self.config.source,
            json!({ "test": true, "message": "Webhook trial delivery" }),
            metadata,
        );

        let request = self.build_request(webhook, &envelope);
        let attempt = self.executor.execute(&request).await;

        match attempt.outcome {
            Ok(response) if response.is_success() => WebhookTestResult {
                success: true,
                status: Some(response.status),
                elapsed_ms: attempt.elapsed_ms,
                error: None,
                tested_at: Utc::now(),
            },
            Ok(response) => WebhookTestResult {
                success: false,
                status: Some(response.status),
                elapsed_ms: attempt.elapsed_ms,
                error: Some(response.error_message()),
                tested_at: Utc::now(),
            },
            Err(error) => WebhookTestResult {
                success: false,
                status: None,
                elapsed_ms: attempt.elapsed_ms,
                error: Some(error.to_string()),
                tested_at: Utc::now(),
            },
        }
    }

    /// Send an envelope under the webhook's auth, timeout, and retry
    /// policy.
    async fn deliver(&self, webhook: &Webhook, envelope: &WebhookEnvelope) -> RetryOutcome {
        let request = self.build_request(webhook, envelope);
        run_with_retry(&webhook.retry, |_| self.executor.execute(&request)).await
    }

    /// Assemble the outbound request. The envelope is serialized exactly
    /// once here; those bytes are both signed and sent.
    fn build_request(&self, webhook: &Webhook, envelope: &WebhookEnvelope) -> OutboundRequest {
        let body = envelope.to_bytes();

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        headers.insert("User-Agent".to_string(), self.config.user_agent.clone());
        for (name, value) in &webhook.headers {
            headers.insert(name.clone(), value.clone());
        }
        webhook.auth.apply(&mut headers, &body);

        let timeout_ms = if webhook.timeout_ms > 0 {
            webhook.timeout_ms
        } else {
            DEFAULT_TIMEOUT_MS
        };

        OutboundRequest {
            method: webhook.method,
            url: webhook.url.clone(),
            headers,
            query: Vec::new(),
            body: Some(body),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn write_log(&self, record: &DeliveryRecord) {
        if let Err(error) = self.store.insert_delivery_log(record).await {
            tracing::error!(
                webhook_id = record.webhook_id,
                error = %error,
                "Failed to write delivery log"
            );
        }
    }
}
