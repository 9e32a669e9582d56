//! Repository for the `api_connections` table.

use sqlx::PgPool;

use flowdesk_core::types::DbId;

use crate::models::connection::{ConnectionRow, CreateConnection, UpdateConnection};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const CONNECTION_COLUMNS: &str = "\
    id, tenant_id, name, description, base_url, auth_config, default_headers, \
    timeout_ms, retry_config, rate_limit, is_active, last_tested_at, \
    last_test_result, total_calls, last_used_at, created_at, updated_at";

/// Provides CRUD and counter operations for API connections.
///
/// Callers are expected to pass DTOs through `validated()` first; the
/// repository serializes them as-is.
pub struct ConnectionRepo;

impl ConnectionRepo {
    /// Create a new connection for a tenant.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        data: &CreateConnection,
    ) -> Result<ConnectionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_connections \
                 (tenant_id, name, description, base_url, auth_config, \
                  default_headers, timeout_ms, retry_config, rate_limit, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {CONNECTION_COLUMNS}"
        );
        sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(tenant_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&data.base_url)
            .bind(serde_json::to_value(&data.auth).expect("auth scheme serializes to JSON"))
            .bind(
                serde_json::to_value(&data.default_headers)
                    .expect("header map serializes to JSON"),
            )
            .bind(data.timeout_ms as i64)
            .bind(serde_json::to_value(data.retry).expect("retry config serializes to JSON"))
            .bind(
                serde_json::to_value(data.rate_limit)
                    .expect("rate limit config serializes to JSON"),
            )
            .bind(data.is_active)
            .fetch_one(pool)
            .await
    }

    /// List a tenant's connections, newest first.
    pub async fn list_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> Result<Vec<ConnectionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONNECTION_COLUMNS} FROM api_connections \
             WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Find a connection by id within a tenant.
    ///
    /// The tenant filter is applied in SQL; a caller can never read another
    /// tenant's row through this method.
    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<ConnectionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONNECTION_COLUMNS} FROM api_connections \
             WHERE id = $1 AND tenant_id = $2"
        );
        sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active connection by id within a tenant.
    ///
    /// Dispatch goes through this lookup: absent, inactive, and
    /// tenant-mismatched rows are all indistinguishable `None`.
    pub async fn find_active_for_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<ConnectionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONNECTION_COLUMNS} FROM api_connections \
             WHERE id = $1 AND tenant_id = $2 AND is_active = true"
        );
        sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Update a connection's settings.
    pub async fn update(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        data: &UpdateConnection,
    ) -> Result<Option<ConnectionRow>, sqlx::Error> {
        let query = format!(
            "UPDATE api_connections SET \
                 name = COALESCE($3, name), \
                 description = COALESCE($4, description), \
                 base_url = COALESCE($5, base_url), \
                 auth_config = COALESCE($6, auth_config), \
                 default_headers = COALESCE($7, default_headers), \
                 timeout_ms = COALESCE($8, timeout_ms), \
                 retry_config = COALESCE($9, retry_config), \
                 rate_limit = COALESCE($10, rate_limit), \
                 is_active = COALESCE($11, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {CONNECTION_COLUMNS}"
        );
        sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&data.base_url)
            .bind(
                data.auth
                    .as_ref()
                    .map(|a| serde_json::to_value(a).expect("auth scheme serializes to JSON")),
            )
            .bind(
                data.default_headers
                    .as_ref()
                    .map(|h| serde_json::to_value(h).expect("header map serializes to JSON")),
            )
            .bind(data.timeout_ms.map(|t| t as i64))
            .bind(
                data.retry
                    .map(|r| serde_json::to_value(r).expect("retry config serializes to JSON")),
            )
            .bind(data.rate_limit.map(|r| {
                serde_json::to_value(r).expect("rate limit config serializes to JSON")
            }))
            .bind(data.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Delete a connection. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, tenant_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_connections WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record one outbound call against the connection's usage counters.
    ///
    /// Uses an atomic in-place increment so concurrent dispatches never
    /// lose updates.
    pub async fn increment_usage(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE api_connections SET \
                 total_calls = total_calls + 1, \
                 last_used_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store the outcome of a connectivity test.
    pub async fn record_test_result(
        pool: &PgPool,
        id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE api_connections SET \
                 last_tested_at = NOW(), \
                 last_test_result = $2, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(pool)
        .await?;
        Ok(())
    }
}
