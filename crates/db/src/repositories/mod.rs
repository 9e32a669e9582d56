//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. All tenant-scoped reads
//! apply the tenant filter in SQL.

pub mod connection_repo;
pub mod delivery_log_repo;
pub mod webhook_repo;

pub use connection_repo::ConnectionRepo;
pub use delivery_log_repo::DeliveryLogRepo;
pub use webhook_repo::WebhookRepo;
