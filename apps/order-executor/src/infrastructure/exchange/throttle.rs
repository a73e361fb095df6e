//! Client-side request spacing for venue APIs.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Spaces requests at least `min_interval` apart.
///
/// Callers reserve the next free slot under the lock and sleep outside it,
/// so concurrent callers queue up in order.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    /// Create a throttle. A zero interval disables throttling.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Minimum spacing between requests.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request may be sent.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait_until = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = next_slot.map_or(now, |slot| slot.max(now));
            *next_slot = Some(slot + self.min_interval);
            slot
        };

        if wait_until > Instant::now() {
            tracing::trace!(
                wait_ms = (wait_until - Instant::now()).as_millis(),
                "Throttling venue request"
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_consecutive_requests() {
        let throttle = RequestThrottle::new(Duration::from_millis(200));
        let start = Instant::now();

        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gap_resets_spacing() {
        let throttle = RequestThrottle::new(Duration::from_millis(100));
        throttle.acquire().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn zero_interval_is_disabled() {
        let throttle = RequestThrottle::new(Duration::ZERO);
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(throttle.min_interval().is_zero());
    }
}
