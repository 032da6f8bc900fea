//! Per-source rate limiting
//!
//! Each source id gets its own grant slot; a request waits until the
//! source's minimum interval has elapsed since the previous *granted*
//! request, then records its own grant before releasing the slot. The
//! check-sleep-record sequence runs while holding the slot's mutex, so
//! two concurrent waiters can never both read a stale grant time, and
//! waiting on one source never throttles another.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

type Slot = Arc<Mutex<Option<Instant>>>;

/// Serializes requests per source id with a minimum spacing
pub struct RateLimiter {
    slots: DashMap<String, Slot>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Suspend until a request to `source_id` is allowed, then record the
    /// grant
    pub async fn before_request(&self, source_id: &str, min_interval: Duration) {
        if min_interval.is_zero() {
            return;
        }

        let slot = self
            .slots
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        // Held across the sleep on purpose: later waiters for the same
        // source queue here instead of racing on the grant time.
        let mut last_grant = slot.lock().await;

        if let Some(previous) = *last_grant {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                let wait = min_interval - elapsed;
                debug!("Rate limit: {} waits {:?}", source_id, wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last_grant = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_requests_are_spaced() {
        let limiter = RateLimiter::new();
        let interval = Duration::from_millis(500);

        let start = Instant::now();
        limiter.before_request("crtsh", interval).await;
        limiter.before_request("crtsh", interval).await;
        limiter.before_request("crtsh", interval).await;

        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_are_independent() {
        let limiter = RateLimiter::new();

        limiter
            .before_request("crtsh", Duration::from_secs(60))
            .await;

        let start = Instant::now();
        limiter
            .before_request("dns_records", Duration::from_secs(60))
            .await;
        assert!(
            start.elapsed() < Duration::from_millis(1),
            "contention on one source must not throttle another"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_serialize() {
        let limiter = Arc::new(RateLimiter::new());
        let interval = Duration::from_millis(200);

        limiter.before_request("geolocation", interval).await;

        let start = Instant::now();
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.before_request("geolocation", interval).await;
                    Instant::now()
                })
            })
            .collect();

        let mut grant_times = Vec::new();
        for task in tasks {
            grant_times.push(task.await.unwrap());
        }
        grant_times.sort();

        // Neither waiter may piggyback on the other's stale grant time:
        // the second grant comes a full interval after the first.
        assert!(grant_times[0] >= start + interval);
        assert!(grant_times[1] >= grant_times[0] + interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.before_request("username_derivation", Duration::ZERO).await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
