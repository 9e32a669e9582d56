//! Event-driven webhook fan-out.
//!
//! [`EventFanout`] resolves every active webhook subscribed to an event and
//! dispatches to all of them concurrently. Deliveries settle
//! independently: a failing — or panicking — dispatch contributes a
//! captured failure result without affecting its siblings, and the
//! aggregate never short-circuits on partial failure.

use std::sync::Arc;

use serde_json::{Map, Value};

use flowdesk_core::types::TenantId;
use flowdesk_core::webhooks::TriggerEvent;

use crate::error::DispatchError;
use crate::store::IntegrationStore;
use crate::webhook::{WebhookDispatcher, WebhookResponse};

/// Aggregate outcome of one event fan-out.
#[derive(Debug)]
pub struct FanoutSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub results: Vec<WebhookResponse>,
}

/// Resolves an event's subscribers and dispatches to all of them.
pub struct EventFanout {
    store: Arc<dyn IntegrationStore>,
    dispatcher: Arc<WebhookDispatcher>,
}

impl EventFanout {
    pub fn new(store: Arc<dyn IntegrationStore>, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Dispatch `event` to every active subscribed webhook of the tenant.
    ///
    /// Only the subscriber lookup itself can error; every per-webhook
    /// outcome, including captured panics, is present in the summary.
    pub async fn trigger_event(
        &self,
        tenant_id: TenantId,
        event: TriggerEvent,
        payload: Value,
        metadata: Map<String, Value>,
    ) -> Result<FanoutSummary, DispatchError> {
        let webhooks = self
            .store
            .list_active_webhooks_for_event(tenant_id, event)
            .await?;

        let mut handles = Vec::with_capacity(webhooks.len());
        for webhook in &webhooks {
            let dispatcher = Arc::clone(&self.dispatcher);
            let payload = payload.clone();
            let metadata = metadata.clone();
            let webhook_id = webhook.id;
            let handle = tokio::spawn(async move {
                dispatcher
                    .execute(tenant_id, webhook_id, event, payload, metadata)
                    .await
            });
            handles.push((webhook_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (webhook_id, handle) in handles {
            match handle.await {
                Ok(response) => results.push(response),
                Err(join_error) => {
                    tracing::error!(
                        webhook_id,
                        error = %join_error,
                        "Webhook dispatch task failed"
                    );
                    results.push(WebhookResponse::failure(
                        webhook_id,
                        event,
                        0,
                        format!("dispatch task failed: {join_error}"),
                    ));
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(
            tenant_id,
            event = %event,
            dispatched = results.len(),
            succeeded,
            "Event fan-out settled"
        );

        Ok(FanoutSummary {
            dispatched: results.len(),
            succeeded,
            results,
        })
    }
}
