//! Event-bus-driven dispatch.
//!
//! Domain code publishes [`IntegrationEvent`]s on an
//! [`IntegrationEventBus`]; [`EventRelay`] consumes them and feeds the
//! fan-out coordinator as a long-lived background task.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use flowdesk_core::types::TenantId;
use flowdesk_core::webhooks::TriggerEvent;

use crate::fanout::EventFanout;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// IntegrationEvent
// ---------------------------------------------------------------------------

/// A tenant-scoped domain event eligible for webhook fan-out.
#[derive(Debug, Clone)]
pub struct IntegrationEvent {
    pub tenant_id: TenantId,
    pub event: TriggerEvent,
    pub payload: Value,
    pub metadata: Map<String, Value>,
}

impl IntegrationEvent {
    /// Create an event with an empty payload and no extra metadata.
    pub fn new(tenant_id: TenantId, event: TriggerEvent) -> Self {
        Self {
            tenant_id,
            event,
            payload: Value::Object(Map::new()),
            metadata: Map::new(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach one extra metadata entry to the envelope.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// IntegrationEventBus
// ---------------------------------------------------------------------------

/// In-process fan-in hub for integration events.
///
/// Wraps a [`broadcast::Sender`] so any number of consumers can
/// independently receive every published event. Designed to be shared via
/// `Arc<IntegrationEventBus>`.
pub struct IntegrationEventBus {
    sender: broadcast::Sender<IntegrationEvent>,
}

impl IntegrationEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: IntegrationEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<IntegrationEvent> {
        self.sender.subscribe()
    }
}

impl Default for IntegrationEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// EventRelay
// ---------------------------------------------------------------------------

/// Background loop connecting the event bus to the fan-out coordinator.
pub struct EventRelay;

impl EventRelay {
    /// Run the relay loop.
    ///
    /// Consumes events from `receiver` until the channel closes (i.e. the
    /// [`IntegrationEventBus`] is dropped). Per-event fan-out failures are
    /// logged and do not stop the loop.
    pub async fn run(fanout: Arc<EventFanout>, mut receiver: broadcast::Receiver<IntegrationEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    match fanout
                        .trigger_event(event.tenant_id, event.event, event.payload, event.metadata)
                        .await
                    {
                        Ok(summary) => {
                            tracing::debug!(
                                event = %event.event,
                                dispatched = summary.dispatched,
                                succeeded = summary.succeeded,
                                "Relayed event to webhooks"
                            );
                        }
                        Err(error) => {
                            tracing::error!(
                                event = %event.event,
                                tenant_id = event.tenant_id,
                                error = %error,
                                "Failed to fan out event"
                            );
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event relay lagged, some events were not dispatched");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, relay shutting down");
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
