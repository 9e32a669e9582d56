//! Persistence boundary for the dispatch engine.
//!
//! [`IntegrationStore`] is the narrow interface the dispatchers depend on;
//! [`PgIntegrationStore`] implements it over the repository layer. Tests
//! inject in-memory doubles.

use async_trait::async_trait;

use flowdesk_core::connections::Connection;
use flowdesk_core::delivery::DeliveryRecord;
use flowdesk_core::error::CoreError;
use flowdesk_core::types::{DbId, TenantId};
use flowdesk_core::webhooks::{TriggerEvent, Webhook};
use flowdesk_db::repositories::{ConnectionRepo, DeliveryLogRepo, WebhookRepo};
use flowdesk_db::DbPool;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Failure at the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be converted to its domain form.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<CoreError> for StoreError {
    fn from(error: CoreError) -> Self {
        Self::Corrupt(error.to_string())
    }
}

// ---------------------------------------------------------------------------
// IntegrationStore
// ---------------------------------------------------------------------------

/// The engine's view of persistence.
///
/// Every read filters by tenant id server-side — the dispatcher never
/// trusts a caller-supplied tenant match without that filter. Lookup
/// methods return only active registrations.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Fetch an active connection owned by `tenant_id`.
    async fn get_connection(
        &self,
        tenant_id: TenantId,
        connection_id: DbId,
    ) -> Result<Option<Connection>, StoreError>;

    /// Fetch an active webhook owned by `tenant_id`.
    async fn get_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: DbId,
    ) -> Result<Option<Webhook>, StoreError>;

    /// All active webhooks of `tenant_id` subscribed to `event`.
    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event: TriggerEvent,
    ) -> Result<Vec<Webhook>, StoreError>;

    /// Count one call against a connection's usage counters.
    ///
    /// `success` is available for stores that track outcomes; the
    /// reference schema counts total calls and last use only.
    async fn increment_connection_usage(
        &self,
        connection_id: DbId,
        success: bool,
    ) -> Result<(), StoreError>;

    /// Bump a webhook's success or failure counter. Success also stamps
    /// `last_triggered_at`.
    async fn increment_webhook_counters(
        &self,
        webhook_id: DbId,
        success: bool,
    ) -> Result<(), StoreError>;

    /// Append one delivery log row.
    async fn insert_delivery_log(&self, record: &DeliveryRecord) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// PgIntegrationStore
// ---------------------------------------------------------------------------

/// Postgres-backed store over the repository layer.
pub struct PgIntegrationStore {
    pool: DbPool,
}

impl PgIntegrationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationStore for PgIntegrationStore {
    async fn get_connection(
        &self,
        tenant_id: TenantId,
        connection_id: DbId,
    ) -> Result<Option<Connection>, StoreError> {
        let row = ConnectionRepo::find_active_for_tenant(&self.pool, tenant_id, connection_id)
            .await?;
        row.map(|r| r.into_domain().map_err(StoreError::from))
            .transpose()
    }

    async fn get_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: DbId,
    ) -> Result<Option<Webhook>, StoreError> {
        let row = WebhookRepo::find_active_for_tenant(&self.pool, tenant_id, webhook_id).await?;
        row.map(|r| r.into_domain().map_err(StoreError::from))
            .transpose()
    }

    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event: TriggerEvent,
    ) -> Result<Vec<Webhook>, StoreError> {
        let rows = WebhookRepo::list_active_for_event(&self.pool, tenant_id, event).await?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(StoreError::from))
            .collect()
    }

    async fn increment_connection_usage(
        &self,
        connection_id: DbId,
        _success: bool,
    ) -> Result<(), StoreError> {
        ConnectionRepo::increment_usage(&self.pool, connection_id)
            .await
            .map_err(Into::into)
    }

    async fn increment_webhook_counters(
        &self,
        webhook_id: DbId,
        success: bool,
    ) -> Result<(), StoreError> {
        if success {
            WebhookRepo::increment_success(&self.pool, webhook_id).await?;
        } else {
            WebhookRepo::increment_failure(&self.pool, webhook_id).await?;
        }
        Ok(())
    }

    async fn insert_delivery_log(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        DeliveryLogRepo::insert(&self.pool, record).await?;
        Ok(())
    }
}
