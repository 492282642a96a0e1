//! Token-bucket rate limiting
//!
//! Refill-then-consume with no queuing: a request either gets its tokens
//! immediately or is rejected. All mutating operations take an explicit
//! `Instant` so tests can drive simulated time; production callers use the
//! `Instant::now()` wrappers.

use std::time::Instant;

/// Token bucket with linear refill up to capacity
#[derive(Debug)]
pub struct RateLimitBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl RateLimitBucket {
    /// Create a full bucket
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    /// Attempt to consume tokens at the current time
    pub fn try_consume(&mut self, tokens: f64) -> bool {
        self.try_consume_at(tokens, Instant::now())
    }

    /// Attempt to consume tokens at an explicit time
    pub fn try_consume_at(&mut self, tokens: f64, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// Tokens currently available at an explicit time
    pub fn available_at(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        // duration_since saturates to zero for earlier instants
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}
