//! Resilience layer wrapping capability invocations
//!
//! Every capability call, whether a synchronous RPC or a background task,
//! goes through [`ResilienceLayer::invoke`]. The layer is an ordered chain of stages
//! fixed at construction: rate limiting (global bucket, then per-method
//! bucket), circuit breaking (per downstream dependency), and response
//! caching. The stage order is data, not nesting; reordering the chain is a
//! construction-time decision.
//!
//! Short-circuit behavior:
//! - rate limit exceeded rejects with the scope that ran dry;
//! - an open breaker rejects without invoking the handler;
//! - a cache hit returns without touching the handler or the breaker;
//! - a handler error counts against the breaker and is never cached.

use crate::capability::CapabilityError;
use crate::config::ResilienceSection;
use crate::observability::metrics::metrics;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub mod breaker;
pub mod cache;
pub mod ratelimit;

pub use breaker::{BreakerState, CircuitBreaker};
pub use cache::{cache_key, CacheEntry, ResponseCache};
pub use ratelimit::RateLimitBucket;

/// Scope name for the global rate limit bucket
pub const GLOBAL_SCOPE: &str = "global";

/// A stage in the resilience chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    CircuitBreaker,
    Cache,
}

/// Default chain order: admission control first, cache last
pub const DEFAULT_STAGES: [Stage; 3] = [Stage::RateLimit, Stage::CircuitBreaker, Stage::Cache];

/// Rejections and failures surfaced by the layer
#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("Rate limit exceeded: {scope}")]
    RateLimited { scope: String },
    #[error("Circuit open for {dependency}")]
    CircuitOpen { dependency: String },
    #[error(transparent)]
    Execution(#[from] CapabilityError),
}

impl ResilienceError {
    /// Whether this is an admission rejection rather than an execution failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ResilienceError::RateLimited { .. } | ResilienceError::CircuitOpen { .. }
        )
    }
}

/// Composable wrapper providing cache, circuit breaking, and rate limiting
/// around any capability invocation
pub struct ResilienceLayer {
    stages: Vec<Stage>,
    config: ResilienceSection,
    global_bucket: Mutex<RateLimitBucket>,
    method_buckets: Mutex<HashMap<String, RateLimitBucket>>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    cache: Mutex<ResponseCache>,
}

impl ResilienceLayer {
    /// Build the layer with the default stage order
    pub fn new(config: ResilienceSection) -> Self {
        Self::with_stages(config, DEFAULT_STAGES.to_vec())
    }

    /// Build the layer with an explicit stage order
    pub fn with_stages(config: ResilienceSection, stages: Vec<Stage>) -> Self {
        let ttl_overrides: HashMap<String, Duration> = config
            .cache_ttl_overrides
            .iter()
            .map(|(method, secs)| (method.clone(), Duration::from_secs(*secs)))
            .collect();

        Self {
            global_bucket: Mutex::new(RateLimitBucket::new(
                config.global_capacity,
                config.global_refill_per_sec,
            )),
            method_buckets: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
            cache: Mutex::new(
                ResponseCache::new(
                    config.cache_size,
                    Duration::from_secs(config.cache_default_ttl_secs),
                )
                .with_ttl_overrides(ttl_overrides),
            ),
            stages,
            config,
        }
    }

    /// Invoke `f` through the resilience chain.
    ///
    /// `dependency` names the downstream the breaker guards; `method` and
    /// `params` drive rate-limit scoping and the cache key.
    pub async fn invoke<F, Fut>(
        &self,
        dependency: &str,
        method: &str,
        params: &Value,
        f: F,
    ) -> Result<Value, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, CapabilityError>>,
    {
        let now = Instant::now();

        for stage in &self.stages {
            match stage {
                Stage::RateLimit => self.admit_rate_limit(method, now)?,
                Stage::CircuitBreaker => self.admit_breaker(dependency, now)?,
                Stage::Cache => {
                    if let Some(value) = self.cache_lookup(method, params, now) {
                        // A cache hit skips the invocation entirely; give
                        // back any half-open probe slot claimed above.
                        self.release_breaker_probe(dependency);
                        metrics().record_cache_hit();
                        return Ok(value);
                    }
                    metrics().record_cache_miss();
                }
            }
        }

        match f().await {
            Ok(value) => {
                if self.stages.contains(&Stage::CircuitBreaker) {
                    self.record_breaker_success(dependency);
                }
                if self.stages.contains(&Stage::Cache) {
                    self.cache
                        .lock()
                        .unwrap()
                        .insert_at(method, params, value.clone(), now);
                }
                Ok(value)
            }
            Err(e) => {
                if self.stages.contains(&Stage::CircuitBreaker) {
                    self.record_breaker_failure(dependency);
                }
                debug!(dependency, method, error = %e, "capability invocation failed");
                Err(ResilienceError::Execution(e))
            }
        }
    }

    fn admit_rate_limit(&self, method: &str, now: Instant) -> Result<(), ResilienceError> {
        if !self.global_bucket.lock().unwrap().try_consume_at(1.0, now) {
            metrics().record_rate_limit_rejection();
            warn!(scope = GLOBAL_SCOPE, "rate limit exceeded");
            return Err(ResilienceError::RateLimited {
                scope: GLOBAL_SCOPE.to_string(),
            });
        }

        let mut buckets = self.method_buckets.lock().unwrap();
        let bucket = buckets.entry(method.to_string()).or_insert_with(|| {
            RateLimitBucket::new(self.config.method_capacity, self.config.method_refill_per_sec)
        });
        if !bucket.try_consume_at(1.0, now) {
            metrics().record_rate_limit_rejection();
            warn!(scope = method, "rate limit exceeded");
            return Err(ResilienceError::RateLimited {
                scope: method.to_string(),
            });
        }
        Ok(())
    }

    fn admit_breaker(&self, dependency: &str, now: Instant) -> Result<(), ResilienceError> {
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers.entry(dependency.to_string()).or_insert_with(|| {
            CircuitBreaker::new(
                self.config.failure_threshold,
                Duration::from_secs(self.config.recovery_timeout_secs),
            )
        });
        if !breaker.should_allow_at(now) {
            metrics().record_breaker_rejection();
            warn!(dependency, "circuit open, rejecting call");
            return Err(ResilienceError::CircuitOpen {
                dependency: dependency.to_string(),
            });
        }
        Ok(())
    }

    fn cache_lookup(&self, method: &str, params: &Value, now: Instant) -> Option<Value> {
        self.cache.lock().unwrap().get_at(method, params, now)
    }

    fn release_breaker_probe(&self, dependency: &str) {
        if let Some(breaker) = self.breakers.lock().unwrap().get_mut(dependency) {
            breaker.release_probe();
        }
    }

    fn record_breaker_success(&self, dependency: &str) {
        if let Some(breaker) = self.breakers.lock().unwrap().get_mut(dependency) {
            breaker.record_success();
        }
    }

    fn record_breaker_failure(&self, dependency: &str) {
        if let Some(breaker) = self.breakers.lock().unwrap().get_mut(dependency) {
            breaker.record_failure();
        }
    }

    /// Current breaker state for a dependency, if one has been created
    pub fn breaker_state(&self, dependency: &str) -> Option<BreakerState> {
        self.breakers
            .lock()
            .unwrap()
            .get(dependency)
            .map(CircuitBreaker::state)
    }

    /// Drop expired cache entries. Called from the periodic sweeper.
    pub fn sweep(&self) {
        self.cache.lock().unwrap().sweep_expired(Instant::now());
    }

    /// Number of live cache entries
    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}
