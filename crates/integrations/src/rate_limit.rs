//! Per-connection sliding-window admission control.
//!
//! [`InMemoryRateLimiter`] keeps a fixed 60-second window per connection id
//! in process memory. It is a single-process, best-effort limiter: counts
//! are not shared across instances and reset on restart. Limiting is
//! advisory admission control, not a hard quota. Deployments running
//! multiple dispatcher instances can inject a [`RateLimiter`] backed by a
//! shared counter store instead.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use flowdesk_core::types::DbId;

/// Length of the admission window.
pub const WINDOW: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Seconds until the window resets; meaningful only when denied.
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs,
        }
    }
}

/// Admission control for outbound API calls, keyed by connection id.
///
/// Only the per-minute limit is enforced here; the hourly budget on a
/// connection is reserved for backends that track longer windows.
pub trait RateLimiter: Send + Sync {
    /// Admit or deny one call under `requests_per_minute`.
    fn check(&self, connection_id: DbId, requests_per_minute: u32) -> RateLimitDecision;
}

// ---------------------------------------------------------------------------
// InMemoryRateLimiter
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

/// Single-process limiter over a mutex-guarded map.
///
/// The check-and-increment runs under one lock acquisition, so two
/// concurrent calls can never both take the last remaining slot.
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<DbId, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, connection_id: DbId, requests_per_minute: u32) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let window = windows.entry(connection_id).or_insert(Window {
            count: 0,
            started: now,
        });

        if now.duration_since(window.started) >= WINDOW {
            window.count = 0;
            window.started = now;
        }

        if window.count >= requests_per_minute {
            let remaining = WINDOW.saturating_sub(now.duration_since(window.started));
            let retry_after = (remaining.as_secs_f64().ceil() as u64).max(1);
            return RateLimitDecision::deny(retry_after);
        }

        window.count += 1;
        RateLimitDecision::allow()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn allows_up_to_limit_then_denies() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check(1, 5).allowed);
        }
        let denied = limiter.check(1, 5);
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs >= 1);
        assert!(denied.retry_after_secs <= 60);
    }

    #[test]
    fn connections_are_limited_independently() {
        let limiter = InMemoryRateLimiter::new();
        assert!(limiter.check(1, 1).allowed);
        assert!(!limiter.check(1, 1).allowed);
        assert!(limiter.check(2, 1).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_sixty_seconds() {
        let limiter = InMemoryRateLimiter::new();
        assert!(limiter.check(1, 1).allowed);
        assert!(!limiter.check(1, 1).allowed);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check(1, 1).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_shrinks_as_window_ages() {
        let limiter = InMemoryRateLimiter::new();
        assert!(limiter.check(1, 1).allowed);

        tokio::time::advance(Duration::from_secs(45)).await;
        let denied = limiter.check(1, 1);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 15);
    }

    #[test]
    fn concurrent_checks_admit_exactly_the_limit() {
        let limiter = Arc::new(InMemoryRateLimiter::new());
        let admitted = Arc::new(AtomicU32::new(0));

        std::thread::scope(|scope| {
            for _ in 0..100 {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                scope.spawn(move || {
                    if limiter.check(7, 50).allowed {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }
}
