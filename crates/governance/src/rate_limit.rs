//! Multi-window rate limiting.
//!
//! Counters use fixed windows keyed by epoch bucket (`now / window_secs`),
//! not sliding windows: a window's count resets when the bucket rolls
//! over, and `retry_after_seconds` is the time to that rollover.

use chrono::Utc;
use std::sync::Arc;

use agentgate_core::{
    traits::RateCounterStore,
    types::{RateLimitCheckResult, RateLimitConfig, RateWindow, WindowUsage, REMAINING_UNKNOWN},
};

/// Rate limiting fails open: an unreachable counter store allows the
/// invocation with `remaining = -1`. Rate limits protect capacity, not
/// cost, so availability wins; the budget enforcer is the fail-closed
/// half of that asymmetry.
pub const RATE_LIMIT_FAIL_OPEN: bool = true;

/// Tracks invocation counts per agent (optionally per user) across
/// minute/hour/day windows.
pub struct RateLimiter {
    store: Arc<dyn RateCounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateCounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Check the limit and, when allowed, consume one unit in every window.
    /// A denied call consumes nothing.
    pub async fn check_rate_limit(
        &self,
        agent_id: &str,
        user_id: Option<&str>,
    ) -> RateLimitCheckResult {
        self.check_at(agent_id, user_id, Utc::now().timestamp(), true)
            .await
    }

    /// Read-only usage snapshot for status surfaces; consumes nothing.
    pub async fn snapshot(&self, agent_id: &str, user_id: Option<&str>) -> RateLimitCheckResult {
        self.check_at(agent_id, user_id, Utc::now().timestamp(), false)
            .await
    }

    fn key(agent_id: &str, user_id: Option<&str>, window: RateWindow, now: i64) -> String {
        let bucket = now / window.duration_secs();
        match user_id {
            Some(user) => format!("rate:{}:{}:{}:{}", agent_id, user, window.as_str(), bucket),
            None => format!("rate:{}:{}:{}", agent_id, window.as_str(), bucket),
        }
    }

    async fn check_at(
        &self,
        agent_id: &str,
        user_id: Option<&str>,
        now: i64,
        consume: bool,
    ) -> RateLimitCheckResult {
        let mut counts = [0u64; 3];
        for (i, window) in RateWindow::ALL.iter().enumerate() {
            match self
                .store
                .get_count(&Self::key(agent_id, user_id, *window, now))
                .await
            {
                Ok(count) => counts[i] = count,
                Err(e) => {
                    // RATE_LIMIT_FAIL_OPEN: availability over enforcement.
                    tracing::warn!(
                        agent_id = agent_id,
                        error = %e,
                        "Rate counter store unreachable, failing open"
                    );
                    return Self::fail_open_result();
                }
            }
        }

        let usage = WindowUsage {
            per_minute: counts[0],
            per_hour: counts[1],
            per_day: counts[2],
        };

        // Narrowest window first; the first exceeded one names the denial.
        for (i, window) in RateWindow::ALL.iter().enumerate() {
            if counts[i] >= self.config.limit(*window) {
                let secs = window.duration_secs();
                let retry_after = (secs - now.rem_euclid(secs)) as u64;

                tracing::debug!(
                    agent_id = agent_id,
                    window = window.as_str(),
                    count = counts[i],
                    "Rate limit exceeded"
                );

                return RateLimitCheckResult {
                    allowed: false,
                    limit_exceeded: Some(*window),
                    remaining: 0,
                    retry_after_seconds: retry_after,
                    current_usage: usage,
                };
            }
        }

        let mut usage = usage;
        if consume {
            for window in RateWindow::ALL {
                let secs = window.duration_secs();
                let ttl = (secs - now.rem_euclid(secs)) as u64;
                if let Err(e) = self
                    .store
                    .incr(&Self::key(agent_id, user_id, window, now), ttl)
                    .await
                {
                    tracing::warn!(
                        agent_id = agent_id,
                        error = %e,
                        "Rate counter increment failed, failing open"
                    );
                    return Self::fail_open_result();
                }
            }
            usage.per_minute += 1;
            usage.per_hour += 1;
            usage.per_day += 1;
        }

        let counts_after = [usage.per_minute, usage.per_hour, usage.per_day];
        let remaining = RateWindow::ALL
            .iter()
            .enumerate()
            .map(|(i, w)| self.config.limit(*w).saturating_sub(counts_after[i]) as i64)
            .min()
            .unwrap_or(0);

        RateLimitCheckResult {
            allowed: true,
            limit_exceeded: None,
            remaining,
            retry_after_seconds: 0,
            current_usage: usage,
        }
    }

    fn fail_open_result() -> RateLimitCheckResult {
        RateLimitCheckResult {
            allowed: true,
            limit_exceeded: None,
            remaining: REMAINING_UNKNOWN,
            retry_after_seconds: 0,
            current_usage: WindowUsage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_core::mocks::FailingRateCounterStore;
    use agentgate_store::InMemoryRateCounterStore;

    fn limiter(per_minute: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryRateCounterStore::new()),
            RateLimitConfig {
                per_minute,
                per_hour: 1_000,
                per_day: 10_000,
            },
        )
    }

    #[tokio::test]
    async fn test_cap_reached_denies_with_window_name() {
        let limiter = limiter(2);
        let now = 1_700_000_000;

        assert!(limiter.check_at("agent-1", None, now, true).await.allowed);
        assert!(limiter.check_at("agent-1", None, now, true).await.allowed);

        let denied = limiter.check_at("agent-1", None, now, true).await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit_exceeded, Some(RateWindow::PerMinute));
        assert!(denied.retry_after_seconds > 0 && denied.retry_after_seconds <= 60);
        assert_eq!(denied.current_usage.per_minute, 2);
    }

    #[tokio::test]
    async fn test_next_minute_window_allows_again() {
        let limiter = limiter(1);
        let now = 1_700_000_000;

        assert!(limiter.check_at("agent-1", None, now, true).await.allowed);
        assert!(!limiter.check_at("agent-1", None, now, true).await.allowed);

        // The following minute bucket starts fresh.
        let next = limiter.check_at("agent-1", None, now + 60, true).await;
        assert!(next.allowed);
        assert_eq!(next.current_usage.per_minute, 1);
    }

    #[tokio::test]
    async fn test_remaining_reflects_most_restrictive_window() {
        let limiter = RateLimiter::new(
            Arc::new(InMemoryRateCounterStore::new()),
            RateLimitConfig {
                per_minute: 10,
                per_hour: 3,
                per_day: 100,
            },
        );
        let now = 1_700_000_000;

        let result = limiter.check_at("agent-1", None, now, true).await;
        assert!(result.allowed);
        // per_hour is tightest: 3 - 1 = 2.
        assert_eq!(result.remaining, 2);
    }

    #[tokio::test]
    async fn test_denied_call_consumes_nothing() {
        let limiter = limiter(1);
        let now = 1_700_000_000;

        limiter.check_at("agent-1", None, now, true).await;
        limiter.check_at("agent-1", None, now, true).await;
        let result = limiter.check_at("agent-1", None, now, true).await;
        assert_eq!(result.current_usage.per_minute, 1);
    }

    #[tokio::test]
    async fn test_per_user_counters_are_independent() {
        let limiter = limiter(1);
        let now = 1_700_000_000;

        assert!(
            limiter
                .check_at("agent-1", Some("alice"), now, true)
                .await
                .allowed
        );
        assert!(
            limiter
                .check_at("agent-1", Some("bob"), now, true)
                .await
                .allowed
        );
        assert!(
            !limiter
                .check_at("agent-1", Some("alice"), now, true)
                .await
                .allowed
        );
    }

    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let limiter = RateLimiter::new(
            Arc::new(FailingRateCounterStore),
            RateLimitConfig::default(),
        );

        let result = limiter.check_rate_limit("agent-1", None).await;
        assert!(result.allowed);
        assert_eq!(result.remaining, REMAINING_UNKNOWN);
    }

    #[tokio::test]
    async fn test_snapshot_does_not_consume() {
        let limiter = limiter(5);
        let now = 1_700_000_000;

        limiter.check_at("agent-1", None, now, true).await;
        let snap = limiter.check_at("agent-1", None, now, false).await;
        assert_eq!(snap.current_usage.per_minute, 1);

        let again = limiter.check_at("agent-1", None, now, false).await;
        assert_eq!(again.current_usage.per_minute, 1);
    }
}
