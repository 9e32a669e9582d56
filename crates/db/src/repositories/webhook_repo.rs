//! Repository for the `webhooks` table.

use sqlx::PgPool;

use flowdesk_core::types::DbId;
use flowdesk_core::webhooks::TriggerEvent;

use crate::models::webhook::{CreateWebhook, UpdateWebhook, WebhookRow};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const WEBHOOK_COLUMNS: &str = "\
    id, tenant_id, name, description, url, method, headers, auth_config, \
    triggers, retry_config, timeout_ms, is_active, last_triggered_at, \
    success_count, failure_count, created_at, updated_at";

/// Provides CRUD and counter operations for webhooks.
///
/// Callers are expected to pass DTOs through `validated()` first; the
/// repository serializes them as-is.
pub struct WebhookRepo;

impl WebhookRepo {
    /// Create a new webhook for a tenant.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        data: &CreateWebhook,
    ) -> Result<WebhookRow, sqlx::Error> {
        let triggers: Vec<String> = data
            .triggers
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        let query = format!(
            "INSERT INTO webhooks \
                 (tenant_id, name, description, url, method, headers, \
                  auth_config, triggers, retry_config, timeout_ms, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {WEBHOOK_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookRow>(&query)
            .bind(tenant_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&data.url)
            .bind(data.method.as_str())
            .bind(serde_json::to_value(&data.headers).expect("header map serializes to JSON"))
            .bind(serde_json::to_value(&data.auth).expect("auth scheme serializes to JSON"))
            .bind(&triggers)
            .bind(serde_json::to_value(data.retry).expect("retry config serializes to JSON"))
            .bind(data.timeout_ms as i64)
            .bind(data.is_active)
            .fetch_one(pool)
            .await
    }

    /// List a tenant's webhooks, newest first.
    pub async fn list_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> Result<Vec<WebhookRow>, sqlx::Error> {
        let query = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, WebhookRow>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Find a webhook by id within a tenant.
    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<WebhookRow>, sqlx::Error> {
        let query = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE id = $1 AND tenant_id = $2"
        );
        sqlx::query_as::<_, WebhookRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active webhook by id within a tenant.
    ///
    /// Dispatch goes through this lookup: absent, inactive, and
    /// tenant-mismatched rows are all indistinguishable `None`.
    pub async fn find_active_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<WebhookRow>, sqlx::Error> {
        let query = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE id = $1 AND tenant_id = $2 AND is_active = true"
        );
        sqlx::query_as::<_, WebhookRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's active webhooks subscribed to `event`.
    pub async fn list_active_for_event(
        pool: &PgPool,
        tenant_id: DbId,
        event: TriggerEvent,
    ) -> Result<Vec<WebhookRow>, sqlx::Error> {
        let query = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE tenant_id = $1 AND is_active = true AND $2 = ANY(triggers) \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, WebhookRow>(&query)
            .bind(tenant_id)
            .bind(event.as_str())
            .fetch_all(pool)
            .await
    }

    /// Update a webhook's settings.
    pub async fn update(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        data: &UpdateWebhook,
    ) -> Result<Option<WebhookRow>, sqlx::Error> {
        let triggers: Option<Vec<String>> = data
            .triggers
            .as_ref()
            .map(|ts| ts.iter().map(|t| t.as_str().to_string()).collect());
        let query = format!(
            "UPDATE webhooks SET \
                 name = COALESCE($3, name), \
                 description = COALESCE($4, description), \
                 url = COALESCE($5, url), \
                 method = COALESCE($6, method), \
                 headers = COALESCE($7, headers), \
                 auth_config = COALESCE($8, auth_config), \
                 triggers = COALESCE($9, triggers), \
                 retry_config = COALESCE($10, retry_config), \
                 timeout_ms = COALESCE($11, timeout_ms), \
                 is_active = COALESCE($12, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {WEBHOOK_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&data.url)
            .bind(data.method.map(|m| m.as_str()))
            .bind(
                data.headers
                    .as_ref()
                    .map(|h| serde_json::to_value(h).expect("header map serializes to JSON")),
            )
            .bind(
                data.auth
                    .as_ref()
                    .map(|a| serde_json::to_value(a).expect("auth scheme serializes to JSON")),
            )
            .bind(triggers)
            .bind(
                data.retry
                    .map(|r| serde_json::to_value(r).expect("retry config serializes to JSON")),
            )
            .bind(data.timeout_ms.map(|t| t as i64))
            .bind(data.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Delete a webhook. Returns `true` if a row was removed.
    ///
    /// Cascade deletes the webhook's delivery logs.
    pub async fn delete(pool: &PgPool, tenant_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful delivery: bump `success_count`, stamp
    /// `last_triggered_at`.
    pub async fn increment_success(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhooks SET \
                 success_count = success_count + 1, \
                 last_triggered_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record an exhausted delivery: bump `failure_count`.
    pub async fn increment_failure(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhooks SET \
                 failure_count = failure_count + 1, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
