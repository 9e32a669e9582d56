//! Retry policy evaluation and the bounded retry loop.
//!
//! A dispatch performs `max_retries + 1` total attempts, stopping
//! immediately on success, on a non-retryable failure, or on the final
//! attempt. Backoff sleeps suspend only the current task; unrelated
//! dispatches proceed in parallel.

use std::future::Future;

use flowdesk_core::connections::RetryConfig;

use crate::executor::{ExecutedAttempt, OutboundResponse, TransportError};

/// Whether an HTTP status is worth retrying: server errors, remote rate
/// limiting (429), and request timeout (408). Every other 4xx is a caller
/// error that cannot succeed on retry.
pub fn retryable_status(status: u16) -> bool {
    status >= 500 || status == 429 || status == 408
}

// ---------------------------------------------------------------------------
// AttemptError
// ---------------------------------------------------------------------------

/// A failed attempt: an HTTP response with a non-2xx status, or a
/// network-level error without a response.
#[derive(Debug)]
pub enum AttemptError {
    Status(OutboundResponse),
    Transport(TransportError),
}

impl AttemptError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(response) => retryable_status(response.status),
            Self::Transport(error) => error.is_retryable(),
        }
    }

    /// Human-readable description for results and logs.
    pub fn message(&self) -> String {
        match self {
            Self::Status(response) => response.error_message(),
            Self::Transport(error) => error.to_string(),
        }
    }

    /// The HTTP status, when the failure carried a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(response) => Some(response.status),
            Self::Transport(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Retry loop
// ---------------------------------------------------------------------------

/// Outcome of a full retry loop.
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<OutboundResponse, AttemptError>,
    /// Attempts actually made beyond the first.
    pub retries: u32,
}

/// Run up to `max_retries + 1` attempts of `attempt`, sleeping the
/// configured backoff between failed retryable attempts.
///
/// `attempt` receives the 0-based attempt index.
pub async fn run_with_retry<F, Fut>(config: &RetryConfig, mut attempt: F) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ExecutedAttempt>,
{
    let total_attempts = config.max_retries.saturating_add(1);
    for attempt_index in 0..total_attempts {
        let executed = attempt(attempt_index).await;
        let error = match executed.outcome {
            Ok(response) if response.is_success() => {
                return RetryOutcome {
                    result: Ok(response),
                    retries: attempt_index,
                };
            }
            Ok(response) => AttemptError::Status(response),
            Err(transport) => AttemptError::Transport(transport),
        };

        let is_final = attempt_index + 1 == total_attempts;
        if is_final || !error.is_retryable() {
            return RetryOutcome {
                result: Err(error),
                retries: attempt_index,
            };
        }

        tracing::warn!(
            attempt = attempt_index + 1,
            error = %error.message(),
            "Outbound attempt failed, retrying"
        );
        tokio::time::sleep(config.delay_for_attempt(attempt_index)).await;
    }
    unreachable!("retry loop returns within the attempt budget")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
