//! Thread-safe metrics collection system
//!
//! Atomic counters tracking protocol traffic, task lifecycle, and resilience
//! stage activity. A serializable snapshot backs the `/metrics` endpoint.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics
pub struct MetricsCollector {
    // RPC traffic (atomic for high frequency)
    rpc_requests: AtomicU64,
    rpc_errors: AtomicU64,
    sync_capability_calls: AtomicU64,

    // Task lifecycle
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_cancelled: AtomicU64,

    // Resilience stages
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    breaker_rejections: AtomicU64,
    rate_limit_rejections: AtomicU64,

    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            rpc_requests: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
            sync_capability_calls: AtomicU64::new(0),
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            breaker_rejections: AtomicU64::new(0),
            rate_limit_rejections: AtomicU64::new(0),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn record_rpc_request(&self) {
        self.rpc_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rpc_error(&self) {
        self.rpc_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_capability_call(&self) {
        self.sync_capability_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_cancelled(&self) {
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_rejection(&self) {
        self.breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Complete metrics snapshot for the /metrics endpoint
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            rpc: RpcMetrics {
                requests: self.rpc_requests.load(Ordering::Relaxed),
                errors: self.rpc_errors.load(Ordering::Relaxed),
                sync_capability_calls: self.sync_capability_calls.load(Ordering::Relaxed),
            },
            tasks: TaskMetrics {
                submitted: self.tasks_submitted.load(Ordering::Relaxed),
                completed: self.tasks_completed.load(Ordering::Relaxed),
                failed: self.tasks_failed.load(Ordering::Relaxed),
                cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            },
            resilience: ResilienceMetrics {
                cache_hits: hits,
                cache_misses: misses,
                cache_hit_rate: hit_rate,
                breaker_rejections: self.breaker_rejections.load(Ordering::Relaxed),
                rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
            },
            uptime_seconds: current_timestamp()
                .saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub rpc: RpcMetrics,
    pub tasks: TaskMetrics,
    pub resilience: ResilienceMetrics,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcMetrics {
    pub requests: u64,
    pub errors: u64,
    pub sync_capability_calls: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskMetrics {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResilienceMetrics {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub breaker_rejections: u64,
    pub rate_limit_rejections: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
