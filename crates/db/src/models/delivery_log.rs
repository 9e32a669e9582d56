//! Delivery log models for the `webhook_delivery_logs` table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use flowdesk_core::types::{DbId, Timestamp};

/// A row from the append-only `webhook_delivery_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryLogRow {
    pub id: DbId,
    pub webhook_id: DbId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub response: serde_json::Value,
    pub status: String,
    pub response_time_ms: i64,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// Filters for listing a webhook's delivery history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryLogFilter {
    pub event_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Per-status delivery totals for one webhook.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeliveryCounts {
    pub success: i64,
    pub failed: i64,
}
