//! Engine error taxonomy.
//!
//! Pre-flight failures surface as [`DispatchError`] and are never retried.
//! Failures inside the retry loop are classified per attempt (see
//! [`crate::retry::AttemptError`]) and end up captured in the structured
//! dispatch results, never thrown past the dispatcher boundary.

use flowdesk_core::types::DbId;

use crate::store::StoreError;

/// A dispatch that failed before any outbound attempt was made.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Registration missing, inactive, or owned by another tenant — the
    /// lookup makes these indistinguishable on purpose.
    #[error("{entity} {id} not found or inactive")]
    NotFound { entity: &'static str, id: DbId },

    /// Malformed input to the dispatcher.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Admission denied by the per-connection rate limiter. No retry
    /// attempt was consumed; callers may try again after the window
    /// resets.
    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// The persistence boundary failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
