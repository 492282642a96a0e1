//! Mock capability implementations for testing
//!
//! Provides canned, failing, and flaky handlers so server, task, and
//! resilience behavior can be exercised without real downstream services.

use crate::capability::{Capability, CapabilityError, CapabilityHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Capability descriptor with a permissive object schema, for tests that do
/// not care about validation
pub fn static_capability(name: &str) -> Capability {
    Capability {
        name: name.to_string(),
        description: format!("Test capability {name}"),
        input_schema: json!({"type": "object"}),
        output_schema: json!({"type": "object"}),
        examples: vec![],
    }
}

/// Handler returning a fixed response and counting invocations
pub struct MockCapability {
    response: Value,
    calls: Arc<AtomicUsize>,
}

impl MockCapability {
    pub fn returning(response: Value) -> Self {
        Self {
            response,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared invocation counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CapabilityHandler for MockCapability {
    async fn execute(&self, _input: &Value) -> Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Handler that always fails with a fixed message
pub struct FailingCapability {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingCapability {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CapabilityHandler for FailingCapability {
    async fn execute(&self, _input: &Value) -> Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CapabilityError::Execution(self.message.clone()))
    }
}

/// Handler that fails a fixed number of times before succeeding; drives
/// circuit breaker recovery scenarios
pub struct FlakyCapability {
    failures_remaining: AtomicUsize,
    response: Value,
}

impl FlakyCapability {
    pub fn failing_times(failures: usize, response: Value) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            response,
        }
    }
}

#[async_trait]
impl CapabilityHandler for FlakyCapability {
    async fn execute(&self, _input: &Value) -> Result<Value, CapabilityError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(CapabilityError::Execution("transient failure".to_string()));
        }
        Ok(self.response.clone())
    }
}

/// Handler that waits for a notification before returning; lets tests hold a
/// task in the Working state deterministically
pub struct BlockingCapability {
    release: Arc<tokio::sync::Notify>,
    response: Value,
}

impl BlockingCapability {
    pub fn new(response: Value) -> (Self, Arc<tokio::sync::Notify>) {
        let release = Arc::new(tokio::sync::Notify::new());
        (
            Self {
                release: Arc::clone(&release),
                response,
            },
            release,
        )
    }
}

#[async_trait]
impl CapabilityHandler for BlockingCapability {
    async fn execute(&self, _input: &Value) -> Result<Value, CapabilityError> {
        self.release.notified().await;
        Ok(self.response.clone())
    }
}
