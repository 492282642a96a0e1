//! Capability system for the Agent2Agent protocol node
//!
//! A capability is a named, schema-described unit of work. The registry maps
//! capability names to their descriptors and handlers, preserving
//! registration order for deterministic discovery documents. Input
//! parameters MUST be validated against the capability's schema before
//! execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub mod builtin;

/// A unit of work an agent can perform
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Execute with parameters already validated against the input schema
    async fn execute(&self, input: &Value) -> Result<Value, CapabilityError>;
}

/// Example input/output pair advertised in the discovery document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityExample {
    pub input: Value,
    pub output: Value,
}

/// Capability descriptor: immutable once registered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capability {
    /// Unique capability name, used directly as an RPC method name
    pub name: String,
    /// Human description
    pub description: String,
    /// JSON Schema for input parameters
    pub input_schema: Value,
    /// JSON Schema for the result
    pub output_schema: Value,
    /// Example invocations
    #[serde(default)]
    pub examples: Vec<CapabilityExample>,
}

struct RegisteredCapability {
    descriptor: Capability,
    handler: Arc<dyn CapabilityHandler>,
}

/// Ordered lookup table of capabilities
///
/// Registration order is preserved; the discovery document and
/// `get_capabilities` list capabilities in the order they were registered.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<RegisteredCapability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a capability with its handler. Names must be unique.
    pub fn register(
        &mut self,
        descriptor: Capability,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Result<(), CapabilityError> {
        if self.contains(&descriptor.name) {
            return Err(CapabilityError::Duplicate(descriptor.name));
        }
        self.entries.push(RegisteredCapability {
            descriptor,
            handler,
        });
        Ok(())
    }

    /// Whether a capability with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.descriptor.name == name)
    }

    /// Descriptor lookup by name
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| &e.descriptor)
    }

    /// Handler lookup by name
    pub fn handler(&self, name: &str) -> Option<Arc<dyn CapabilityHandler>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| Arc::clone(&e.handler))
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> Vec<&Capability> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Capability names in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate parameters against the capability's input schema
    pub fn validate_input(&self, name: &str, parameters: &Value) -> Result<(), CapabilityError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| CapabilityError::Unknown(name.to_string()))?;

        let validator = jsonschema::validator_for(&descriptor.input_schema)
            .map_err(|e| CapabilityError::Schema(format!("Schema compilation error: {e}")))?;

        validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            CapabilityError::Validation(error_messages.join("; "))
        })
    }

    /// Validate then execute a capability by name
    pub async fn execute(&self, name: &str, parameters: &Value) -> Result<Value, CapabilityError> {
        let handler = self
            .handler(name)
            .ok_or_else(|| CapabilityError::Unknown(name.to_string()))?;

        self.validate_input(name, parameters)?;

        handler.execute(parameters).await
    }
}

/// Capability system errors
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Unknown capability: {0}")]
    Unknown(String),
    #[error("Capability already registered: {0}")]
    Duplicate(String),
    #[error("Parameter validation failed: {0}")]
    Validation(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Capability execution failed: {0}")]
    Execution(String),
}
