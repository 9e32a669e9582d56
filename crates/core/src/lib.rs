//! Flowdesk integration domain types.
//!
//! Pure domain layer for the outbound integration engine: auth schemes and
//! payload signing, connection/webhook registrations with their bounds and
//! validation, the trigger-event vocabulary, the webhook wire envelope, and
//! delivery outcome records. No I/O lives here; the dispatch engine and the
//! persistence layer both build on these types.

pub mod auth;
pub mod connections;
pub mod delivery;
pub mod error;
pub mod http;
pub mod types;
pub mod webhooks;

pub use auth::{AuthScheme, AuthSurface};
pub use connections::{Connection, RateLimitConfig, RetryConfig};
pub use delivery::{DeliveryRecord, DeliveryStatus};
pub use error::CoreError;
pub use http::HttpMethod;
pub use webhooks::{TriggerEvent, Webhook, WebhookEnvelope};
