//! Flowdesk outbound integration dispatch engine.
//!
//! Executes tenant API calls against registered connections and fans out
//! event-triggered webhook deliveries, under per-connection rate limits,
//! bounded exponential-backoff retries, and pluggable auth schemes:
//!
//! - [`ApiDispatcher`] — tenant-to-external-API calls with rate admission
//!   and usage accounting.
//! - [`WebhookDispatcher`] — single webhook delivery with signed, byte-
//!   stable envelopes and persisted delivery logs.
//! - [`EventFanout`] — concurrent, failure-isolated fan-out of one event
//!   to every subscribed webhook.
//! - [`EventRelay`] — background loop feeding the fan-out coordinator from
//!   the in-process event bus.
//!
//! The store, HTTP transport, and rate limiter are injected traits, so the
//! whole engine runs against test doubles.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod fanout;
pub mod rate_limit;
pub mod relay;
pub mod retry;
pub mod store;
pub mod webhook;

pub use api::{ApiDispatcher, ApiRequest, ApiResponse, ConnectionTestResult};
pub use config::DispatchConfig;
pub use error::DispatchError;
pub use executor::{
    HttpTransport, OutboundRequest, OutboundResponse, RequestExecutor, ReqwestTransport,
    TransportError,
};
pub use fanout::{EventFanout, FanoutSummary};
pub use rate_limit::{InMemoryRateLimiter, RateLimitDecision, RateLimiter};
pub use relay::{EventRelay, IntegrationEvent, IntegrationEventBus};
pub use store::{IntegrationStore, PgIntegrationStore, StoreError};
pub use webhook::{WebhookDispatcher, WebhookResponse, WebhookTestResult};
