//! Webhook domain types: trigger vocabulary, registration, wire envelope.
//!
//! The [`WebhookEnvelope`] is the external wire contract. It is built and
//! serialized exactly once per dispatch; retries resend the same bytes, so
//! the timestamp is never refreshed mid-retry and payload signatures stay
//! valid across attempts.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AuthScheme;
use crate::connections::RetryConfig;
use crate::error::CoreError;
use crate::http::HttpMethod;
use crate::types::{DbId, TenantId};

// ---------------------------------------------------------------------------
// TriggerEvent
// ---------------------------------------------------------------------------

/// The governed vocabulary of events a webhook can subscribe to.
///
/// New values require explicit addition here so that publishers and
/// registrations stay in agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    FileUploaded,
    FileProcessed,
    DashboardUpdated,
    QueryExecuted,
    UserCreated,
    TenantCreated,
    TaskCompleted,
    WorkflowFinished,
    CustomEvent,
}

impl TriggerEvent {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileUploaded => "file_uploaded",
            Self::FileProcessed => "file_processed",
            Self::DashboardUpdated => "dashboard_updated",
            Self::QueryExecuted => "query_executed",
            Self::UserCreated => "user_created",
            Self::TenantCreated => "tenant_created",
            Self::TaskCompleted => "task_completed",
            Self::WorkflowFinished => "workflow_finished",
            Self::CustomEvent => "custom_event",
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "file_uploaded" => Ok(Self::FileUploaded),
            "file_processed" => Ok(Self::FileProcessed),
            "dashboard_updated" => Ok(Self::DashboardUpdated),
            "query_executed" => Ok(Self::QueryExecuted),
            "user_created" => Ok(Self::UserCreated),
            "tenant_created" => Ok(Self::TenantCreated),
            "task_completed" => Ok(Self::TaskCompleted),
            "workflow_finished" => Ok(Self::WorkflowFinished),
            "custom_event" => Ok(Self::CustomEvent),
            _ => Err(CoreError::Validation(format!(
                "Unknown trigger event: '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

/// A tenant-registered outbound callback receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub auth: AuthScheme,
    pub triggers: Vec<TriggerEvent>,
    pub retry: RetryConfig,
    pub timeout_ms: u64,
    pub is_active: bool,
}

impl Webhook {
    /// Whether this webhook has declared `event` in its trigger set.
    ///
    /// A webhook never fires for an event type it has not declared.
    pub fn subscribes_to(&self, event: TriggerEvent) -> bool {
        self.triggers.contains(&event)
    }
}

/// A webhook must subscribe to at least one trigger event.
pub fn validate_triggers(triggers: &[TriggerEvent]) -> Result<(), CoreError> {
    if triggers.is_empty() {
        return Err(CoreError::Validation(
            "webhook must subscribe to at least one trigger event".to_string(),
        ));
    }
    Ok(())
}

/// Webhook deliveries must use a body-carrying method.
pub fn validate_webhook_method(method: HttpMethod) -> Result<(), CoreError> {
    if !method.allowed_for_webhook() {
        return Err(CoreError::Validation(format!(
            "HTTP method '{method}' is not allowed for webhooks. Must be one of: POST, PUT, PATCH"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WebhookEnvelope
// ---------------------------------------------------------------------------

/// The canonical envelope delivered to webhook receivers.
///
/// ```json
/// { "event": "...", "timestamp": "...", "data": { ... },
///   "metadata": { "tenantId": "...", "webhookId": "...", "source": "...", ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub timestamp: String,
    pub data: Value,
    pub metadata: Map<String, Value>,
}

impl WebhookEnvelope {
    /// Build the envelope for one dispatch, stamped with the current time.
    ///
    /// Caller-supplied `extra_metadata` entries are merged after the
    /// engine-set keys and take precedence on conflict.
    pub fn new(
        event: &str,
        tenant_id: TenantId,
        webhook_id: DbId,
        source: &str,
        data: Value,
        extra_metadata: Map<String, Value>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("tenantId".to_string(), Value::String(tenant_id.to_string()));
        metadata.insert(
            "webhookId".to_string(),
            Value::String(webhook_id.to_string()),
        );
        metadata.insert("source".to_string(), Value::String(source.to_string()));
        for (key, value) in extra_metadata {
            metadata.insert(key, value);
        }

        Self {
            event: event.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
            metadata,
        }
    }

    /// Serialize to the exact bytes placed on the wire.
    ///
    /// Call once per dispatch and reuse the buffer for both signing and
    /// sending; re-serializing is what this method exists to avoid.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("envelope contains only JSON-native values")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- TriggerEvent -------------------------------------------------------

    #[test]
    fn trigger_event_all_variants_roundtrip() {
        let names = [
            "file_uploaded",
            "file_processed",
            "dashboard_updated",
            "query_executed",
            "user_created",
            "tenant_created",
            "task_completed",
            "workflow_finished",
            "custom_event",
        ];
        for name in names {
            let event = TriggerEvent::from_str(name).unwrap();
            assert_eq!(event.as_str(), name);
        }
    }

    #[test]
    fn trigger_event_unknown_rejects() {
        assert!(TriggerEvent::from_str("invoice_paid").is_err());
    }

    #[test]
    fn trigger_event_serde_uses_snake_case() {
        let json = serde_json::to_string(&TriggerEvent::TaskCompleted).unwrap();
        assert_eq!(json, r#""task_completed""#);
    }

    // -- Validation ---------------------------------------------------------

    #[test]
    fn empty_trigger_set_rejects() {
        assert!(validate_triggers(&[]).is_err());
        assert!(validate_triggers(&[TriggerEvent::CustomEvent]).is_ok());
    }

    #[test]
    fn get_method_rejects_for_webhooks() {
        assert!(validate_webhook_method(HttpMethod::Get).is_err());
        assert!(validate_webhook_method(HttpMethod::Delete).is_err());
        assert!(validate_webhook_method(HttpMethod::Post).is_ok());
    }

    // -- WebhookEnvelope ----------------------------------------------------

    fn sample_envelope() -> WebhookEnvelope {
        WebhookEnvelope::new(
            "task_completed",
            7,
            42,
            "flowdesk",
            json!({"task": "quarterly-report"}),
            Map::new(),
        )
    }

    #[test]
    fn envelope_carries_engine_metadata_as_strings() {
        let envelope = sample_envelope();
        assert_eq!(envelope.event, "task_completed");
        assert_eq!(envelope.metadata["tenantId"], json!("7"));
        assert_eq!(envelope.metadata["webhookId"], json!("42"));
        assert_eq!(envelope.metadata["source"], json!("flowdesk"));
        assert_eq!(envelope.data["task"], "quarterly-report");
    }

    #[test]
    fn envelope_timestamp_is_rfc3339_utc() {
        let envelope = sample_envelope();
        assert!(envelope.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&envelope.timestamp).is_ok());
    }

    #[test]
    fn caller_metadata_merges_and_overrides() {
        let mut extra = Map::new();
        extra.insert("requestId".to_string(), json!("req-1"));
        extra.insert("source".to_string(), json!("workflow-engine"));
        let envelope = WebhookEnvelope::new("custom_event", 1, 2, "flowdesk", json!({}), extra);
        assert_eq!(envelope.metadata["requestId"], json!("req-1"));
        assert_eq!(envelope.metadata["source"], json!("workflow-engine"));
    }

    #[test]
    fn serialization_is_byte_stable() {
        let envelope = sample_envelope();
        assert_eq!(envelope.to_bytes(), envelope.to_bytes());
    }

    #[test]
    fn subscribes_to_checks_trigger_set() {
        let webhook = Webhook {
            id: 1,
            tenant_id: 1,
            name: "hook".to_string(),
            url: "https://receiver.example.com/hook".to_string(),
            method: HttpMethod::Post,
            headers: HashMap::new(),
            auth: AuthScheme::None,
            triggers: vec![TriggerEvent::FileUploaded, TriggerEvent::TaskCompleted],
            retry: RetryConfig::webhook_default(),
            timeout_ms: 30_000,
            is_active: true,
        };
        assert!(webhook.subscribes_to(TriggerEvent::FileUploaded));
        assert!(!webhook.subscribes_to(TriggerEvent::UserCreated));
    }
}
