//! API connection models and DTOs for the `api_connections` table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use flowdesk_core::auth::{AuthScheme, AuthSurface};
use flowdesk_core::connections::{
    self, Connection, RateLimitConfig, RetryConfig, DEFAULT_TIMEOUT_MS,
};
use flowdesk_core::error::CoreError;
use flowdesk_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// ConnectionRow
// ---------------------------------------------------------------------------

/// A row from the `api_connections` table.
///
/// **Note:** `auth_config` holds credentials and is never serialized into
/// responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConnectionRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub auth_config: serde_json::Value,
    pub default_headers: serde_json::Value,
    pub timeout_ms: i64,
    pub retry_config: serde_json::Value,
    pub rate_limit: serde_json::Value,
    pub is_active: bool,
    pub last_tested_at: Option<Timestamp>,
    pub last_test_result: Option<serde_json::Value>,
    pub total_calls: i64,
    pub last_used_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ConnectionRow {
    /// Convert into the engine's domain representation.
    ///
    /// JSONB config columns are written through the validated DTOs, so a
    /// parse failure here means the row was corrupted out of band.
    pub fn into_domain(self) -> Result<Connection, CoreError> {
        let auth: AuthScheme = parse_column(self.id, "auth_config", self.auth_config)?;
        let default_headers: HashMap<String, String> =
            parse_column(self.id, "default_headers", self.default_headers)?;
        let retry: RetryConfig = parse_column(self.id, "retry_config", self.retry_config)?;
        let rate_limit: RateLimitConfig = parse_column(self.id, "rate_limit", self.rate_limit)?;

        Ok(Connection {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            base_url: self.base_url,
            auth,
            default_headers,
            timeout_ms: self.timeout_ms.max(0) as u64,
            retry,
            rate_limit,
            is_active: self.is_active,
        })
    }
}

fn parse_column<T: serde::de::DeserializeOwned>(
    id: DbId,
    column: &str,
    value: serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(value).map_err(|e| {
        CoreError::Internal(format!("corrupt {column} on connection {id}: {e}"))
    })
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for registering a new API connection.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConnection {
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl CreateConnection {
    /// Validate and clamp into storable form.
    ///
    /// Out-of-range numeric knobs are clamped to their bounds, never
    /// widened; structural problems (bad URL, incomplete auth) reject.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "connection name must not be empty".to_string(),
            ));
        }
        connections::validate_base_url(&self.base_url)?;
        self.auth.validate_for(AuthSurface::Api)?;
        self.timeout_ms = connections::clamp_api_timeout_ms(self.timeout_ms);
        self.retry = self.retry.clamped();
        self.rate_limit = self.rate_limit.clamped();
        Ok(self)
    }
}

/// DTO for updating an existing API connection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateConnection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub auth: Option<AuthScheme>,
    pub default_headers: Option<HashMap<String, String>>,
    pub timeout_ms: Option<u64>,
    pub retry: Option<RetryConfig>,
    pub rate_limit: Option<RateLimitConfig>,
    pub is_active: Option<bool>,
}

impl UpdateConnection {
    /// Validate and clamp whichever fields are present.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoreError::Validation(
                    "connection name must not be empty".to_string(),
                ));
            }
        }
        if let Some(base_url) = &self.base_url {
            connections::validate_base_url(base_url)?;
        }
        if let Some(auth) = &self.auth {
            auth.validate_for(AuthSurface::Api)?;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            self.timeout_ms = Some(connections::clamp_api_timeout_ms(timeout_ms));
        }
        if let Some(retry) = self.retry {
            self.retry = Some(retry.clamped());
        }
        if let Some(rate_limit) = self.rate_limit {
            self.rate_limit = Some(rate_limit.clamped());
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

    fn create_dto() -> CreateConnection {
        serde_json::from_value(json!({
            "name": "billing-api",
            "base_url": "https://billing.example.com",
        }))
        .unwrap()
    }

    #[test]
    fn create_dto_fills_defaults() {
        let dto = create_dto();
        assert_eq!(dto.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(dto.auth, AuthScheme::None);
        assert!(dto.is_active);
        assert_eq!(dto.retry, RetryConfig::default());
        assert_eq!(dto.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn create_dto_clamps_and_validates() {
        let mut dto = create_dto();
        dto.timeout_ms = 5;
        dto.retry.max_retries = 50;
        let validated = dto.validated().unwrap();
        assert_eq!(validated.timeout_ms, connections::MIN_TIMEOUT_MS);
        assert_eq!(validated.retry.max_retries, connections::MAX_RETRIES_LIMIT);
    }

    #[test]
    fn create_dto_rejects_bad_url_and_empty_name() {
        let mut dto = create_dto();
        dto.base_url = "not a url".to_string();
        assert!(dto.validated().is_err());

        let mut dto = create_dto();
        dto.name = "  ".to_string();
        assert!(dto.validated().is_err());
    }

    #[test]
    fn create_dto_rejects_webhook_only_auth() {
        let mut dto = create_dto();
        dto.auth = AuthScheme::HmacSignature {
            secret_key: "s".to_string(),
            signature_header: "X-Signature".to_string(),
        };
        assert!(dto.validated().is_err());
    }

    #[test]
    fn row_converts_to_domain() {
        let row = ConnectionRow {
            id: 9,
            tenant_id: 3,
            name: "crm".to_string(),
            description: None,
            base_url: "https://crm.example.com".to_string(),
            auth_config: json!({"auth_type": "bearer_token", "token": "t"}),
            default_headers: json!({"X-Env": "prod"}),
            timeout_ms: 15_000,
            retry_config: json!({"max_retries": 2}),
            rate_limit: json!({}),
            is_active: true,
            last_tested_at: None,
            last_test_result: None,
            total_calls: 0,
            last_used_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let connection = row.into_domain().unwrap();
        assert_eq!(connection.timeout_ms, 15_000);
        assert_eq!(connection.retry.max_retries, 2);
        assert_eq!(
            connection.default_headers.get("X-Env").map(String::as_str),
            Some("prod")
        );
        assert!(matches!(connection.auth, AuthScheme::BearerToken { .. }));
    }

    #[test]
    fn corrupt_auth_config_errors() {
        let row = ConnectionRow {
            id: 9,
            tenant_id: 3,
            name: "crm".to_string(),
            description: None,
            base_url: "https://crm.example.com".to_string(),
            auth_config: json!({"auth_type": "launch_codes"}),
            default_headers: json!({}),
            timeout_ms: 15_000,
            retry_config: json!({}),
            rate_limit: json!({}),
            is_active: true,
            last_tested_at: None,
            last_test_result: None,
            total_calls: 0,
            last_used_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
