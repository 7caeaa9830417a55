//! Rate limiters shared across all operations of one store handle
//!
//! Two independent limiters throttle a handle: one bounds remote calls per
//! second (a permit is acquired immediately before every request), the other
//! bounds upload bytes per second (every buffered part is metered through it
//! before the transport call). Acquisition waits for capacity and never
//! fails.
//!
//! The schedule is a reservation token bucket: each acquisition claims the
//! next free slot and pushes the schedule forward by `permits / rate`, so
//! concurrent acquirers are serialized fairly without a background refill
//! task.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Schedule {
    next_free: Instant,
}

/// Token-schedule rate limiter, safe for concurrent acquisition
#[derive(Debug)]
pub struct RateLimiter {
    /// Time one permit occupies; `None` means unbounded
    per_permit: Option<Duration>,
    schedule: Mutex<Schedule>,
}

impl RateLimiter {
    /// Limiter issuing `rate` permits per second.
    pub fn new(rate: f64) -> Self {
        let per_permit = if rate.is_finite() && rate > 0.0 {
            Some(Duration::from_secs_f64(1.0 / rate))
        } else {
            None
        };
        Self {
            per_permit,
            schedule: Mutex::new(Schedule {
                next_free: Instant::now(),
            }),
        }
    }

    /// Limiter that never waits.
    pub fn unbounded() -> Self {
        Self {
            per_permit: None,
            schedule: Mutex::new(Schedule {
                next_free: Instant::now(),
            }),
        }
    }

    /// Acquire one permit, waiting until the schedule has room.
    pub async fn acquire(&self) {
        self.acquire_many(1).await;
    }

    /// Acquire `permits` permits as one reservation.
    ///
    /// The reservation claims the current slot and charges its cost to later
    /// acquirers, so a large burst (for example a full part of bytes) starts
    /// immediately and subsequent callers absorb the wait.
    pub async fn acquire_many(&self, permits: u64) {
        let Some(per_permit) = self.per_permit else {
            return;
        };

        let wait = {
            let mut schedule = self
                .schedule
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let now = Instant::now();
            let start = schedule.next_free.max(now);
            let cost = Duration::from_secs_f64(per_permit.as_secs_f64() * permits as f64);
            schedule.next_free = start + cost;
            start.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unbounded_never_waits() {
        let limiter = RateLimiter::unbounded();
        let start = Instant::now();
        for _ in 0..10_000 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquires_are_spaced_by_rate() {
        let limiter = RateLimiter::new(10.0); // 100ms per permit
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        // First is free, the next two wait 100ms each on the virtual clock.
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(200),
            "elapsed {elapsed:?} should cover two spaced permits"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_reservation_charges_later_acquirers() {
        let limiter = RateLimiter::new(1000.0); // 1ms per permit

        // The burst itself starts immediately.
        let start = Instant::now();
        limiter.acquire_many(500).await;
        assert!(start.elapsed() < Duration::from_millis(1));

        // The follower pays for the burst: ~500ms on the virtual clock.
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquirers_all_complete() {
        let limiter = Arc::new(RateLimiter::new(100.0));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
