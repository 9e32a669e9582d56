//! External API connection domain types, bounds, and validation.
//!
//! A [`Connection`] is a tenant-scoped registration of an external REST API:
//! base URL, auth scheme, default headers, timeout, retry policy, and rate
//! limits. Numeric knobs are clamped into their allowed ranges at
//! registration time and never silently widened.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::ValidateUrl;

use crate::auth::AuthScheme;
use crate::error::CoreError;
use crate::types::{DbId, TenantId};

// ---------------------------------------------------------------------------
// Bounds and defaults
// ---------------------------------------------------------------------------

/// Minimum per-call timeout.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Maximum per-call timeout for API connections.
pub const MAX_API_TIMEOUT_MS: u64 = 300_000;

/// Maximum per-call timeout for webhook deliveries.
pub const MAX_WEBHOOK_TIMEOUT_MS: u64 = 120_000;

/// Timeout applied when neither the call site nor the registration sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Maximum number of retries after the initial attempt.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Bounds for the base retry delay.
pub const MIN_RETRY_DELAY_MS: u64 = 100;
pub const MAX_RETRY_DELAY_MS: u64 = 10_000;

/// Default retry policy for API connections.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Default base retry delay for webhook deliveries.
pub const DEFAULT_WEBHOOK_RETRY_DELAY_MS: u64 = 2_000;

/// Rate limit defaults and ceilings (per connection).
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 1_000;
pub const MAX_REQUESTS_PER_MINUTE: u32 = 10_000;
pub const MAX_REQUESTS_PER_HOUR: u32 = 100_000;

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

/// Bounded retry policy for one registration.
///
/// A dispatch performs `max_retries + 1` total attempts. The delay before
/// the retry after failed attempt `i` (0-based) is
/// `retry_delay_ms * 2^i` with exponential backoff, else a constant
/// `retry_delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            exponential_backoff: true,
        }
    }
}

impl RetryConfig {
    /// Default policy for webhook deliveries (longer base delay).
    pub fn webhook_default() -> Self {
        Self {
            retry_delay_ms: DEFAULT_WEBHOOK_RETRY_DELAY_MS,
            ..Self::default()
        }
    }

    /// Clamp both knobs into their allowed ranges.
    pub fn clamped(self) -> Self {
        Self {
            max_retries: self.max_retries.min(MAX_RETRIES_LIMIT),
            retry_delay_ms: self
                .retry_delay_ms
                .clamp(MIN_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS),
            exponential_backoff: self.exponential_backoff,
        }
    }

    /// Backoff delay applied after failed attempt `attempt_index` (0-based).
    pub fn delay_for_attempt(&self, attempt_index: u32) -> Duration {
        let ms = if self.exponential_backoff {
            // The shift is bounded well below overflow by MAX_RETRIES_LIMIT.
            self.retry_delay_ms
                .saturating_mul(1u64 << attempt_index.min(20))
        } else {
            self.retry_delay_ms
        };
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// RateLimitConfig
// ---------------------------------------------------------------------------

/// Per-connection admission limits for outbound API calls.
///
/// Only the per-minute window is enforced by the in-process limiter; the
/// hourly budget is stored for limiter backends that can track it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            requests_per_hour: DEFAULT_REQUESTS_PER_HOUR,
        }
    }
}

impl RateLimitConfig {
    /// Clamp both limits into their allowed ranges.
    pub fn clamped(self) -> Self {
        Self {
            requests_per_minute: self.requests_per_minute.clamp(1, MAX_REQUESTS_PER_MINUTE),
            requests_per_hour: self.requests_per_hour.clamp(1, MAX_REQUESTS_PER_HOUR),
        }
    }
}

// ---------------------------------------------------------------------------
// Timeout clamps
// ---------------------------------------------------------------------------

/// Clamp an API-connection timeout into its allowed range.
pub fn clamp_api_timeout_ms(timeout_ms: u64) -> u64 {
    timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_API_TIMEOUT_MS)
}

/// Clamp a webhook timeout into its allowed range.
pub fn clamp_webhook_timeout_ms(timeout_ms: u64) -> u64 {
    timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_WEBHOOK_TIMEOUT_MS)
}

// ---------------------------------------------------------------------------
// Base URL validation
// ---------------------------------------------------------------------------

/// A connection's base URL must be a well-formed absolute URL.
pub fn validate_base_url(url: &str) -> Result<(), CoreError> {
    if !url.to_string().validate_url() {
        return Err(CoreError::Validation(format!(
            "base URL '{url}' is not a valid absolute URL"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A tenant-registered external REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub name: String,
    pub base_url: String,
    pub auth: AuthScheme,
    pub default_headers: HashMap<String, String>,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
