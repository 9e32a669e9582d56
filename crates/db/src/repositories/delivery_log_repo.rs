//! Repository for the append-only `webhook_delivery_logs` table.

use sqlx::PgPool;

use flowdesk_core::delivery::DeliveryRecord;
use flowdesk_core::types::DbId;

use crate::models::delivery_log::{DeliveryCounts, DeliveryLogFilter, DeliveryLogRow};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const LOG_COLUMNS: &str = "\
    id, webhook_id, event_type, payload, response, status, \
    response_time_ms, retry_count, error_message, created_at";

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Provides append and read operations for delivery logs.
///
/// Rows are never updated or deleted individually; the table is the audit
/// trail of dispatch outcomes.
pub struct DeliveryLogRepo;

impl DeliveryLogRepo {
    /// Append one delivery outcome, returning the generated id.
    pub async fn insert(pool: &PgPool, record: &DeliveryRecord) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO webhook_delivery_logs \
                 (webhook_id, event_type, payload, response, status, \
                  response_time_ms, retry_count, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(record.webhook_id)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(&record.response)
        .bind(record.status.as_str())
        .bind(record.response_time_ms as i64)
        .bind(record.retry_count as i32)
        .bind(&record.error_message)
        .fetch_one(pool)
        .await
    }

    /// List a webhook's delivery history, newest first, with optional
    /// event-type and status filters.
    pub async fn list_for_webhook(
        pool: &PgPool,
        webhook_id: DbId,
        filter: &DeliveryLogFilter,
    ) -> Result<Vec<DeliveryLogRow>, sqlx::Error> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = filter.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM webhook_delivery_logs \
             WHERE webhook_id = $1 \
               AND ($2::text IS NULL OR event_type = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(webhook_id)
            .bind(&filter.event_type)
            .bind(&filter.status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Per-status delivery totals for one webhook.
    pub async fn counts_for_webhook(
        pool: &PgPool,
        webhook_id: DbId,
    ) -> Result<DeliveryCounts, sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM webhook_delivery_logs \
             WHERE webhook_id = $1 GROUP BY status",
        )
        .bind(webhook_id)
        .fetch_all(pool)
        .await?;

        let mut counts = DeliveryCounts::default();
        for (status, count) in rows {
            match status.as_str() {
                "success" => counts.success = count,
                "failed" => counts.failed = count,
                _ => {}
            }
        }
        Ok(counts)
    }
}
