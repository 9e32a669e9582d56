//! Delivery outcome records.
//!
//! Exactly one [`DeliveryRecord`] is appended per webhook dispatch that
//! resolved a registered webhook, after its retry loop terminated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::DbId;

/// Final classification of a webhook dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(CoreError::Validation(format!(
                "Invalid delivery status: '{s}'. Must be one of: success, failed"
            ))),
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only delivery-log entry summarizing one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryRecord {
    pub webhook_id: DbId,
    pub event_type: String,
    /// The envelope that was (or would have been) transmitted.
    pub payload: Value,
    /// Response or outcome summary: status line on success, classification
    /// on failure.
    pub response: Value,
    pub status: DeliveryStatus,
    pub response_time_ms: u64,
    /// Retries actually used beyond the first attempt.
    pub retry_count: u32,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        assert_eq!(
            DeliveryStatus::from_str("success").unwrap(),
            DeliveryStatus::Success
        );
        assert_eq!(
            DeliveryStatus::from_str("failed").unwrap(),
            DeliveryStatus::Failed
        );
        assert_eq!(DeliveryStatus::Success.as_str(), "success");
        assert!(DeliveryStatus::from_str("pending").is_err());
    }
}
