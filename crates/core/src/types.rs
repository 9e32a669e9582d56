/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Tenant identifiers share the `DbId` key space.
pub type TenantId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
