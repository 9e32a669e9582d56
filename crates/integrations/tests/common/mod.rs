//! Shared test doubles and fixtures for the dispatch engine suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use flowdesk_core::auth::AuthScheme;
use flowdesk_core::connections::{Connection, RateLimitConfig, RetryConfig};
use flowdesk_core::delivery::DeliveryRecord;
use flowdesk_core::http::HttpMethod;
use flowdesk_core::types::{DbId, TenantId};
use flowdesk_core::webhooks::{TriggerEvent, Webhook};
use flowdesk_integrations::api::ApiDispatcher;
use flowdesk_integrations::config::DispatchConfig;
use flowdesk_integrations::executor::{
    HttpTransport, OutboundRequest, OutboundResponse, RequestExecutor, TransportError,
};
use flowdesk_integrations::fanout::EventFanout;
use flowdesk_integrations::rate_limit::{InMemoryRateLimiter, RateLimiter};
use flowdesk_integrations::store::{IntegrationStore, StoreError};
use flowdesk_integrations::webhook::WebhookDispatcher;

/// Tenant used by the default fixtures.
pub const TENANT: TenantId = 1;

/// A tenant that owns nothing in the fixtures.
pub const OTHER_TENANT: TenantId = 2;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`IntegrationStore`] with inspectable counters and logs.
#[derive(Default)]
pub struct MemoryStore {
    connections: Mutex<HashMap<DbId, Connection>>,
    webhooks: Mutex<HashMap<DbId, Webhook>>,
    logs: Mutex<Vec<DeliveryRecord>>,
    connection_usage: Mutex<HashMap<DbId, u32>>,
    webhook_counters: Mutex<HashMap<DbId, (u32, u32)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_connection(&self, connection: Connection) {
        self.connections
            .lock()
            .unwrap()
            .insert(connection.id, connection);
    }

    pub fn add_webhook(&self, webhook: Webhook) {
        self.webhooks.lock().unwrap().insert(webhook.id, webhook);
    }

    pub fn logs(&self) -> Vec<DeliveryRecord> {
        self.logs.lock().unwrap().clone()
    }

    pub fn connection_usage(&self, id: DbId) -> u32 {
        self.connection_usage
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    /// `(success_count, failure_count)` recorded for a webhook.
    pub fn webhook_counters(&self, id: DbId) -> (u32, u32) {
        self.webhook_counters
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or((0, 0))
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn get_connection(
        &self,
        tenant_id: TenantId,
        connection_id: DbId,
    ) -> Result<Option<Connection>, StoreError> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .get(&connection_id)
            .filter(|c| c.tenant_id == tenant_id && c.is_active)
            .cloned())
    }

    async fn get_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: DbId,
    ) -> Result<Option<Webhook>, StoreError> {
        Ok(self
            .webhooks
            .lock()
            .unwrap()
            .get(&webhook_id)
            .filter(|w| w.tenant_id == tenant_id && w.is_active)
            .cloned())
    }

    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event: TriggerEvent,
    ) -> Result<Vec<Webhook>, StoreError> {
        let mut webhooks: Vec<Webhook> = self
            .webhooks
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.tenant_id == tenant_id && w.is_active && w.subscribes_to(event))
            .cloned()
            .collect();
        webhooks.sort_by_key(|w| w.id);
        Ok(webhooks)
    }

    async fn increment_connection_usage(
        &self,
        connection_id: DbId,
        _success: bool,
    ) -> Result<(), StoreError> {
        *self
            .connection_usage
            .lock()
            .unwrap()
            .entry(connection_id)
            .or_insert(0) += 1;
        Ok(())
    }

    async fn increment_webhook_counters(
        &self,
        webhook_id: DbId,
        success: bool,
    ) -> Result<(), StoreError> {
        let mut counters = self.webhook_counters.lock().unwrap();
        let entry = counters.entry(webhook_id).or_insert((0, 0));
        if success {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
        Ok(())
    }

    async fn insert_delivery_log(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        self.logs.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RoutedTransport
// ---------------------------------------------------------------------------

enum RouteBehavior {
    Status(u16),
    /// Pops statuses front-to-back; the last one repeats.
    Sequence(Vec<u16>),
    Error(TransportError),
    Panic,
}

enum Action {
    Respond(u16),
    Fail(TransportError),
    Panic(String),
}

/// Scripted [`HttpTransport`] routing by URL substring.
///
/// Unmatched requests get a 200. Every request, including ones that end in
/// a scripted panic, is recorded for inspection.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<Vec<(String, RouteBehavior)>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl RoutedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route_status(&self, fragment: &str, status: u16) {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), RouteBehavior::Status(status)));
    }

    pub fn route_sequence(&self, fragment: &str, statuses: Vec<u16>) {
        assert!(!statuses.is_empty());
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), RouteBehavior::Sequence(statuses)));
    }

    pub fn route_error(&self, fragment: &str, error: TransportError) {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), RouteBehavior::Error(error)));
    }

    pub fn route_panic(&self, fragment: &str) {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), RouteBehavior::Panic));
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_for(&self, fragment: &str) -> Vec<OutboundRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }
}

fn scripted_response(status: u16) -> OutboundResponse {
    let body: &[u8] = if (200..300).contains(&status) {
        br#"{"ok":true}"#
    } else {
        br#"{"message":"simulated failure"}"#
    };
    OutboundResponse {
        status,
        status_text: String::new(),
        headers: HashMap::new(),
        body: body.to_vec(),
    }
}

#[async_trait]
impl HttpTransport for RoutedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        // Resolve the action under the lock, act on it outside, so a
        // scripted panic cannot poison the routes for sibling tasks.
        let action = {
            let mut routes = self.routes.lock().unwrap();
            let mut action = Action::Respond(200);
            for (fragment, behavior) in routes.iter_mut() {
                if request.url.contains(fragment.as_str()) {
                    action = match behavior {
                        RouteBehavior::Status(status) => Action::Respond(*status),
                        RouteBehavior::Sequence(statuses) => {
                            let status = if statuses.len() > 1 {
                                statuses.remove(0)
                            } else {
                                statuses[0]
                            };
                            Action::Respond(status)
                        }
                        RouteBehavior::Error(error) => Action::Fail(error.clone()),
                        RouteBehavior::Panic => Action::Panic(fragment.clone()),
                    };
                    break;
                }
            }
            action
        };

        match action {
            Action::Respond(status) => Ok(scripted_response(status)),
            Action::Fail(error) => Err(error),
            Action::Panic(fragment) => panic!("scripted transport panic for '{fragment}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn connection(id: DbId) -> Connection {
    Connection {
        id,
        tenant_id: TENANT,
        name: format!("conn-{id}"),
        base_url: format!("https://api-{id}.example.test"),
        auth: AuthScheme::None,
        default_headers: HashMap::new(),
        timeout_ms: 30_000,
        retry: RetryConfig::default(),
        rate_limit: RateLimitConfig::default(),
        is_active: true,
    }
}

pub fn webhook(id: DbId) -> Webhook {
    Webhook {
        id,
        tenant_id: TENANT,
        name: format!("hook-{id}"),
        url: format!("https://receiver.example.test/hook/{id}"),
        method: HttpMethod::Post,
        headers: HashMap::new(),
        auth: AuthScheme::None,
        triggers: vec![TriggerEvent::TaskCompleted],
        retry: RetryConfig::webhook_default(),
        timeout_ms: 30_000,
        is_active: true,
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

pub fn api_dispatcher(store: &Arc<MemoryStore>, transport: &Arc<RoutedTransport>) -> ApiDispatcher {
    api_dispatcher_with_limiter(store, transport, Arc::new(InMemoryRateLimiter::new()))
}

pub fn api_dispatcher_with_limiter(
    store: &Arc<MemoryStore>,
    transport: &Arc<RoutedTransport>,
    limiter: Arc<dyn RateLimiter>,
) -> ApiDispatcher {
    ApiDispatcher::new(
        Arc::clone(store) as Arc<dyn IntegrationStore>,
        RequestExecutor::new(Arc::clone(transport) as Arc<dyn HttpTransport>),
        limiter,
        DispatchConfig::default(),
    )
}

pub fn webhook_dispatcher(
    store: &Arc<MemoryStore>,
    transport: &Arc<RoutedTransport>,
) -> WebhookDispatcher {
    WebhookDispatcher::new(
        Arc::clone(store) as Arc<dyn IntegrationStore>,
        RequestExecutor::new(Arc::clone(transport) as Arc<dyn HttpTransport>),
        DispatchConfig::default(),
    )
}

pub fn fanout(store: &Arc<MemoryStore>, transport: &Arc<RoutedTransport>) -> EventFanout {
    EventFanout::new(
        Arc::clone(store) as Arc<dyn IntegrationStore>,
        Arc::new(webhook_dispatcher(store, transport)),
    )
}
