//! Token bucket limiting outbound requests
//!
//! The bucket is owned by exactly one flush loop, so it takes `&mut self`
//! and carries no synchronization of its own.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Refill rate and burst size of a [`RateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Permits added per second
    pub per_second: f64,
    /// Bucket size; also the number of permits available at start
    pub burst: u32,
}

impl RateLimit {
    pub fn new(per_second: f64, burst: u32) -> Self {
        Self { per_second, burst }
    }

    /// One request every `interval`, no burst
    pub fn every(interval: Duration) -> Self {
        let secs = interval.as_secs_f64();
        let per_second = if secs > 0.0 { 1.0 / secs } else { f64::INFINITY };
        Self::new(per_second, 1)
    }
}

/// Token bucket
///
/// # Example
///
/// ```
/// use fanout_logger::{RateLimit, RateLimiter};
///
/// let mut limiter = RateLimiter::new(RateLimit::new(10.0, 2));
/// assert!(limiter.try_acquire());
/// assert!(limiter.try_acquire());
/// assert!(!limiter.try_acquire()); // burst spent, refill pending
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: RateLimit,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        let burst = f64::from(limit.burst.max(1));
        Self {
            limit: RateLimit {
                burst: limit.burst.max(1),
                ..limit
            },
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.limit.per_second).min(f64::from(self.limit.burst));
        self.last_refill = now;
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next permit becomes available
    pub fn time_until_available(&mut self) -> Duration {
        self.refill(Instant::now());
        if self.tokens >= 1.0 || !self.limit.per_second.is_finite() {
            return Duration::ZERO;
        }
        if self.limit.per_second <= 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64((1.0 - self.tokens) / self.limit.per_second).unwrap_or(Duration::MAX)
    }

    /// Take a permit, sleeping until one is available
    ///
    /// Returns how long the caller waited.
    pub fn acquire(&mut self) -> Duration {
        let start = Instant::now();
        loop {
            if self.try_acquire() {
                return start.elapsed();
            }
            let wait = self.time_until_available();
            // a zero-rate bucket never refills; poll instead of sleeping forever
            thread::sleep(wait.min(Duration::from_secs(1)).max(Duration::from_millis(1)));
        }
    }
}
