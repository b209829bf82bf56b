//! Sliding-window rate limiter.
//!
//! Window-by-bucket counting keyed by an arbitrary string (the ingestion
//! gateway keys by source address; other call sites may key however they
//! like and bring their own budgets). State lives in a DashMap so the
//! per-key mutation is atomic: the entry guard holds the shard lock for the
//! duration of the bump.
//!
//! This is an in-process store. A horizontally-scaled deployment needs the
//! same contract backed by a shared store (e.g. Redis), or each instance
//! will independently under-enforce the budget; the interface is
//! deliberately store-agnostic so that swap stays local to this module.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

/// Outcome of a single `check_and_consume` call.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Attempts left in the current window (0 when over budget).
    pub remaining: u32,
    /// When the current window ends and the count resets.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Seconds until the window resets, suitable for a Retry-After hint.
    pub fn retry_after_secs(&self) -> u64 {
        (self.reset_at - Utc::now()).num_seconds().max(0) as u64
    }
}

struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SlidingWindowLimiter {
    entries: DashMap<String, WindowEntry>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Count one attempt against `key` and decide whether it is allowed.
    ///
    /// A missing or expired entry starts a fresh window with count = 1 and
    /// `reset_at = now + window`; otherwise the existing count is bumped
    /// and compared against `max_attempts`.
    pub fn check_and_consume(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> RateLimitDecision {
        let now = Utc::now();
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(60));

        let mut entry = self.entries.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: now + window,
        });

        // Entries past their window are logically expired and must not
        // reject new requests.
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        entry.count += 1;
        let allowed = entry.count <= max_attempts;
        let decision = RateLimitDecision {
            allowed,
            remaining: max_attempts.saturating_sub(entry.count),
            reset_at: entry.reset_at,
        };

        if !allowed {
            trace!(
                "Rate limit exceeded for '{}': {} attempts in window",
                key, entry.count
            );
        }

        decision
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.reset_at);
        before - self.entries.len()
    }

    /// Number of live window entries (for monitoring).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Background GC loop, independent of the request path.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            let removed = self.sweep_expired();
            if removed > 0 {
                debug!("Rate limiter sweep removed {} expired entries", removed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_budget() {
        let limiter = SlidingWindowLimiter::new();
        for i in 0..10 {
            let decision = limiter.check_and_consume("1.2.3.4", 10, Duration::from_secs(60));
            assert!(decision.allowed, "attempt {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 10 - (i + 1));
        }
    }

    #[test]
    fn test_rejects_over_budget() {
        let limiter = SlidingWindowLimiter::new();
        for _ in 0..10 {
            assert!(
                limiter
                    .check_and_consume("1.2.3.4", 10, Duration::from_secs(60))
                    .allowed
            );
        }
        let eleventh = limiter.check_and_consume("1.2.3.4", 10, Duration::from_secs(60));
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.remaining, 0);
        assert!(eleventh.reset_at > Utc::now());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::new();
        for _ in 0..11 {
            limiter.check_and_consume("1.2.3.4", 10, Duration::from_secs(60));
        }
        let other = limiter.check_and_consume("5.6.7.8", 10, Duration::from_secs(60));
        assert!(other.allowed);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_count() {
        let limiter = SlidingWindowLimiter::new();
        let window = Duration::from_millis(50);

        for _ in 0..3 {
            limiter.check_and_consume("1.2.3.4", 2, window);
        }
        assert!(!limiter.check_and_consume("1.2.3.4", 2, window).allowed);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let fresh = limiter.check_and_consume("1.2.3.4", 2, window);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let limiter = SlidingWindowLimiter::new();
        limiter.check_and_consume("short", 10, Duration::from_millis(30));
        limiter.check_and_consume("long", 10, Duration::from_secs(60));
        assert_eq!(limiter.len(), 2);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(limiter.sweep_expired(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_concurrent_consume_has_no_lost_updates() {
        let limiter = Arc::new(SlidingWindowLimiter::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut allowed = 0usize;
                for _ in 0..50 {
                    if limiter
                        .check_and_consume("shared", 100, Duration::from_secs(60))
                        .allowed
                    {
                        allowed += 1;
                    }
                }
                allowed
            }));
        }

        let total_allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 400 attempts against a budget of 100: exactly 100 get through.
        assert_eq!(total_allowed, 100);
    }
}
