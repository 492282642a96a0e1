//! Circuit breaker state machine
//!
//! Per-dependency failure isolation. Closed admits everything and resets its
//! counter on success; at the failure threshold the breaker opens and
//! rejects until the recovery timeout elapses, after which exactly one probe
//! is admitted (half-open). Probe success closes the breaker, probe failure
//! reopens it with a fresh timestamp.

use std::time::{Duration, Instant};

/// Breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-dependency circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            failure_threshold,
            recovery_timeout,
            probe_in_flight: false,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Gate a call at the current time
    pub fn should_allow(&mut self) -> bool {
        self.should_allow_at(Instant::now())
    }

    /// Gate a call at an explicit time.
    ///
    /// Open transitions to HalfOpen once the recovery timeout has elapsed;
    /// HalfOpen admits a single probe until its outcome is recorded.
    pub fn should_allow_at(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self
                    .last_failure
                    .map(|t| now.duration_since(t))
                    .unwrap_or(Duration::MAX);
                if elapsed > self.recovery_timeout {
                    self.state = BreakerState::HalfOpen;
                    self.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if self.probe_in_flight {
                    false
                } else {
                    self.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful call: closes the breaker and resets the counter
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.state = BreakerState::Closed;
        self.probe_in_flight = false;
    }

    /// Record a failed call at the current time
    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    /// Record a failed call at an explicit time
    pub fn record_failure_at(&mut self, now: Instant) {
        self.failure_count += 1;
        self.last_failure = Some(now);
        self.probe_in_flight = false;

        if self.state == BreakerState::HalfOpen || self.failure_count >= self.failure_threshold {
            self.state = BreakerState::Open;
        }
    }

    /// Release an admitted probe whose call never ran (e.g. served from
    /// cache). Without this a half-open breaker would wait forever for an
    /// outcome that is not coming.
    pub fn release_probe(&mut self) {
        self.probe_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_secs(60))
    }

    #[test]
    fn test_closed_allows_and_success_resets_counter() {
        let mut b = breaker();
        let now = Instant::now();

        assert!(b.should_allow_at(now));
        b.record_failure_at(now);
        b.record_failure_at(now);
        assert_eq!(b.failure_count(), 2);

        b.record_success();
        assert_eq!(b.failure_count(), 0);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn test_opens_at_threshold_and_rejects() {
        let mut b = breaker();
        let now = Instant::now();

        for _ in 0..3 {
            assert!(b.should_allow_at(now));
            b.record_failure_at(now);
        }
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.should_allow_at(now));
        assert!(!b.should_allow_at(now + Duration::from_secs(59)));
    }

    #[test]
    fn test_half_open_admits_exactly_one_probe() {
        let mut b = breaker();
        let t0 = Instant::now();

        for _ in 0..3 {
            b.record_failure_at(t0);
        }

        let after_recovery = t0 + Duration::from_secs(61);
        assert!(b.should_allow_at(after_recovery));
        assert_eq!(b.state(), BreakerState::HalfOpen);

        // Second caller while the probe is in flight is rejected
        assert!(!b.should_allow_at(after_recovery));
    }

    #[test]
    fn test_probe_success_closes_breaker() {
        let mut b = breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            b.record_failure_at(t0);
        }

        let t1 = t0 + Duration::from_secs(61);
        assert!(b.should_allow_at(t1));
        b.record_success();

        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.should_allow_at(t1));
    }

    #[test]
    fn test_probe_failure_reopens_with_fresh_timestamp() {
        let mut b = breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            b.record_failure_at(t0);
        }

        let t1 = t0 + Duration::from_secs(61);
        assert!(b.should_allow_at(t1));
        b.record_failure_at(t1);
        assert_eq!(b.state(), BreakerState::Open);

        // Timeout is measured from the probe failure, not the original trip
        assert!(!b.should_allow_at(t1 + Duration::from_secs(59)));
        assert!(b.should_allow_at(t1 + Duration::from_secs(61)));
    }

    #[test]
    fn test_release_probe_frees_half_open_slot() {
        let mut b = breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            b.record_failure_at(t0);
        }

        let t1 = t0 + Duration::from_secs(61);
        assert!(b.should_allow_at(t1));
        b.release_probe();
        assert!(b.should_allow_at(t1));
    }
}
