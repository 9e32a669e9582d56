//! Webhook models and DTOs for the `webhooks` table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use flowdesk_core::auth::{AuthScheme, AuthSurface};
use flowdesk_core::connections::{self, RetryConfig, DEFAULT_TIMEOUT_MS};
use flowdesk_core::error::CoreError;
use flowdesk_core::http::HttpMethod;
use flowdesk_core::types::{DbId, Timestamp};
use flowdesk_core::webhooks::{self, TriggerEvent, Webhook};

// ---------------------------------------------------------------------------
// WebhookRow
// ---------------------------------------------------------------------------

/// A row from the `webhooks` table.
///
/// **Note:** `auth_config` holds credentials and is never serialized into
/// responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub method: String,
    pub headers: serde_json::Value,
    #[serde(skip_serializing)]
    pub auth_config: serde_json::Value,
    pub triggers: Vec<String>,
    pub retry_config: serde_json::Value,
    pub timeout_ms: i64,
    pub is_active: bool,
    pub last_triggered_at: Option<Timestamp>,
    pub success_count: i64,
    pub failure_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookRow {
    /// Convert into the engine's domain representation.
    pub fn into_domain(self) -> Result<Webhook, CoreError> {
        let id = self.id;
        let method = HttpMethod::from_str(&self.method)?;
        let triggers = self
            .triggers
            .iter()
            .map(|s| TriggerEvent::from_str(s))
            .collect::<Result<Vec<_>, _>>()?;
        let headers: HashMap<String, String> = parse_column(id, "headers", self.headers)?;
        let auth: AuthScheme = parse_column(id, "auth_config", self.auth_config)?;
        let retry: RetryConfig = parse_column(id, "retry_config", self.retry_config)?;

        Ok(Webhook {
            id,
            tenant_id: self.tenant_id,
            name: self.name,
            url: self.url,
            method,
            headers,
            auth,
            triggers,
            retry,
            timeout_ms: self.timeout_ms.max(0) as u64,
            is_active: self.is_active,
        })
    }
}

fn parse_column<T: serde::de::DeserializeOwned>(
    id: DbId,
    column: &str,
    value: serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(value)
        .map_err(|e| CoreError::Internal(format!("corrupt {column} on webhook {id}: {e}")))
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for registering a new webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebhook {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub auth: AuthScheme,
    pub triggers: Vec<TriggerEvent>,
    #[serde(default = "RetryConfig::webhook_default")]
    pub retry: RetryConfig,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_method() -> HttpMethod {
    HttpMethod::Post
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl CreateWebhook {
    /// Validate and clamp into storable form.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "webhook name must not be empty".to_string(),
            ));
        }
        connections::validate_base_url(&self.url)?;
        webhooks::validate_webhook_method(self.method)?;
        webhooks::validate_triggers(&self.triggers)?;
        self.auth.validate_for(AuthSurface::Webhook)?;
        self.timeout_ms = connections::clamp_webhook_timeout_ms(self.timeout_ms);
        self.retry = self.retry.clamped();
        Ok(self)
    }
}

/// DTO for updating an existing webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWebhook {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: Option<HashMap<String, String>>,
    pub auth: Option<AuthScheme>,
    pub triggers: Option<Vec<TriggerEvent>>,
    pub retry: Option<RetryConfig>,
    pub timeout_ms: Option<u64>,
    pub is_active: Option<bool>,
}

impl UpdateWebhook {
    /// Validate and clamp whichever fields are present.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoreError::Validation(
                    "webhook name must not be empty".to_string(),
                ));
            }
        }
        if let Some(url) = &self.url {
            connections::validate_base_url(url)?;
        }
        if let Some(method) = self.method {
            webhooks::validate_webhook_method(method)?;
        }
        if let Some(triggers) = &self.triggers {
            webhooks::validate_triggers(triggers)?;
        }
        if let Some(auth) = &self.auth {
            auth.validate_for(AuthSurface::Webhook)?;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            self.timeout_ms = Some(connections::clamp_webhook_timeout_ms(timeout_ms));
        }
        if let Some(retry) = self.retry {
            self.retry = Some(retry.clamped());
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_dto() -> CreateWebhook {
        serde_json::from_value(json!({
            "name": "deploy-hook",
            "url": "https://receiver.example.com/hook",
            "triggers": ["task_completed"],
        }))
        .unwrap()
    }

    #[test]
    fn create_dto_fills_defaults() {
        let dto = create_dto();
        assert_eq!(dto.method, HttpMethod::Post);
        assert_eq!(dto.retry, RetryConfig::webhook_default());
        assert_eq!(dto.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(dto.is_active);
    }

    #[test]
    fn create_dto_rejects_empty_triggers() {
        let mut dto = create_dto();
        dto.triggers.clear();
        assert!(dto.validated().is_err());
    }

    #[test]
    fn create_dto_rejects_get_method() {
        let mut dto = create_dto();
        dto.method = HttpMethod::Get;
        assert!(dto.validated().is_err());
    }

    #[test]
    fn create_dto_rejects_api_only_auth() {
        let mut dto = create_dto();
        dto.auth = AuthScheme::BasicAuth {
            username: "u".to_string(),
            password: "p".to_string(),
        };
        assert!(dto.validated().is_err());
    }

    #[test]
    fn create_dto_clamps_webhook_timeout() {
        let mut dto = create_dto();
        dto.timeout_ms = 999_999;
        let validated = dto.validated().unwrap();
        assert_eq!(validated.timeout_ms, connections::MAX_WEBHOOK_TIMEOUT_MS);
    }

    #[test]
    fn row_converts_to_domain() {
        let row = WebhookRow {
            id: 4,
            tenant_id: 2,
            name: "hook".to_string(),
            description: None,
            url: "https://receiver.example.com/hook".to_string(),
            method: "POST".to_string(),
            headers: json!({}),
            auth_config: json!({"auth_type": "hmac_signature", "secret_key": "s"}),
            triggers: vec!["file_uploaded".to_string(), "custom_event".to_string()],
            retry_config: json!({"retry_delay_ms": 2000}),
            timeout_ms: 30_000,
            is_active: true,
            last_triggered_at: None,
            success_count: 0,
            failure_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let webhook = row.into_domain().unwrap();
        assert_eq!(webhook.method, HttpMethod::Post);
        assert_eq!(
            webhook.triggers,
            vec![TriggerEvent::FileUploaded, TriggerEvent::CustomEvent]
        );
        assert!(matches!(webhook.auth, AuthScheme::HmacSignature { .. }));
    }

    #[test]
    fn row_with_unknown_trigger_errors() {
        let row = WebhookRow {
            id: 4,
            tenant_id: 2,
            name: "hook".to_string(),
            description: None,
            url: "https://receiver.example.com/hook".to_string(),
            method: "POST".to_string(),
            headers: json!({}),
            auth_config: json!({"auth_type": "none"}),
            triggers: vec!["comet_sighted".to_string()],
            retry_config: json!({}),
            timeout_ms: 30_000,
            is_active: true,
            last_triggered_at: None,
            success_count: 0,
            failure_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
