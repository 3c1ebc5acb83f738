//! Client-side request rate limiting.
//!
//! Two constraints gate every physical request: a minimum inter-request
//! interval, and a sliding window holding at most N grant timestamps.
//! Acquisition is strictly FIFO: callers queue on a fair async mutex and the
//! lock is held across the wait, so slots are granted one at a time in
//! arrival order.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

/// Upper bound on the random jitter added to each wait, in ms.
const SLOT_JITTER_MS: u64 = 150;

/// Thresholds for [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Minimum spacing between granted slots.
    pub min_interval: Duration,
    /// Length of the sliding window.
    pub window: Duration,
    /// Maximum grants inside one window.
    pub max_per_window: usize,
}

#[derive(Debug)]
struct LimiterState {
    last_grant: Option<Instant>,
    /// Grant timestamps still inside the window, oldest first.
    grants: VecDeque<Instant>,
}

/// FIFO slot limiter shared by all callers of the query engine.
pub struct RateLimiter {
    settings: RateLimitSettings,
    state: tokio::sync::Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            state: tokio::sync::Mutex::new(LimiterState {
                last_grant: None,
                grants: VecDeque::new(),
            }),
        }
    }

    /// Acquires one request slot, waiting as long as the thresholds demand.
    ///
    /// The fair mutex is held for the whole wait: concurrent acquirers are
    /// granted slots strictly one at a time, in arrival order.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        // Minimum spacing since the previous grant.
        if let Some(last) = state.last_grant {
            let elapsed = Instant::now().saturating_duration_since(last);
            if elapsed < self.settings.min_interval {
                let wait = self.settings.min_interval - elapsed + jitter();
                debug!(wait_ms = wait.as_millis() as u64, "spacing out request slot");
                tokio::time::sleep(wait).await;
            }
        }

        // Sliding window: wait until the oldest grant exits.
        loop {
            let now = Instant::now();
            if let Some(cutoff) = now.checked_sub(self.settings.window) {
                while state.grants.front().is_some_and(|oldest| *oldest <= cutoff) {
                    state.grants.pop_front();
                }
            }
            if state.grants.len() < self.settings.max_per_window {
                break;
            }
            let Some(oldest) = state.grants.front().copied() else {
                break;
            };
            let wait = (oldest + self.settings.window).saturating_duration_since(now) + jitter();
            debug!(wait_ms = wait.as_millis() as u64, "rate window full, waiting");
            tokio::time::sleep(wait).await;
        }

        let now = Instant::now();
        state.last_grant = Some(now);
        state.grants.push_back(now);
    }
}

/// Uniform random delay in `[0, 150]` ms.
fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..=SLOT_JITTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(min_ms: u64, window_ms: u64, max: usize) -> RateLimiter {
        RateLimiter::new(RateLimitSettings {
            min_interval: Duration::from_millis(min_ms),
            window: Duration::from_millis(window_ms),
            max_per_window: max,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_slot_is_immediate() {
        let limiter = limiter(2000, 10_000, 3);
        let started = Instant::now();
        limiter.acquire().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_slots_are_spaced() {
        let limiter = limiter(2000, 60_000, 100);
        limiter.acquire().await;
        let before_second = Instant::now();
        limiter.acquire().await;
        assert!(
            before_second.elapsed() >= Duration::from_millis(2000),
            "second slot must wait out the interval, waited {:?}",
            before_second.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_caps_grants() {
        // No interval constraint; 2 grants per 1 second window.
        let limiter = limiter(0, 1000, 2);
        let started = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(started.elapsed() < Duration::from_millis(500));

        // Third grant must wait for the first to exit the window.
        limiter.acquire().await;
        assert!(
            started.elapsed() >= Duration::from_millis(1000),
            "third slot granted at {:?}",
            started.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_has_more_than_max_grants() {
        let limiter = Arc::new(limiter(0, 1000, 3));
        let mut grants = Vec::new();
        for _ in 0..7 {
            limiter.acquire().await;
            grants.push(Instant::now());
        }
        for window_start in 0..grants.len() {
            let end = grants[window_start] + Duration::from_millis(1000);
            let inside = grants[window_start..]
                .iter()
                .filter(|g| **g < end)
                .count();
            assert!(inside <= 3, "{} grants inside one window", inside);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquirers_are_fifo() {
        let limiter = Arc::new(limiter(100, 60_000, 100));
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                order.lock().push(i);
            }));
            // Let each task reach the mutex queue before spawning the next.
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.expect("task should finish");
        }

        assert_eq!(order.lock().as_slice(), &[0, 1, 2, 3, 4]);
    }
}
