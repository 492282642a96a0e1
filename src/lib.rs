//! Agentlink - Agent2Agent Protocol Node
//!
//! A production-ready Rust implementation of the Agent2Agent (A2A) discovery
//! and task protocol over JSON-RPC 2.0.
//!
//! # Overview
//!
//! This crate provides a complete A2A protocol node, including:
//! - JSON-RPC 2.0 envelope types and boundary validation
//! - Capability registry with JSON Schema input validation
//! - Agent card generation for discovery
//! - Asynchronous task lifecycle management
//! - A resilience layer (cache, circuit breaker, rate limiter) around every
//!   capability invocation
//! - HTTP server and outbound client
//!
//! # Quick Start
//!
//! ```rust
//! use agentlink::capability::CapabilityRegistry;
//! use agentlink::capability::builtin::register_weather_capabilities;
//! use agentlink::card::{AgentCardBuilder, AgentIdentity};
//! use std::sync::Arc;
//!
//! // Register the builtin capability set
//! let mut registry = CapabilityRegistry::new();
//! register_weather_capabilities(&mut registry).unwrap();
//!
//! // Generate the discovery document
//! let identity = AgentIdentity {
//!     id: "weather-agent-001".to_string(),
//!     name: "Weather Agent".to_string(),
//!     description: "Weather information over A2A".to_string(),
//!     version: "1.0.0".to_string(),
//!     endpoint: "http://localhost:8001".to_string(),
//!     card_ttl_secs: 3600,
//! };
//! let card = AgentCardBuilder::new(identity, Arc::new(registry)).build();
//! assert_eq!(card.capabilities.len(), 3);
//! ```

pub mod capability;
pub mod card;
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod resilience;
pub mod server;
pub mod task;
pub mod testing;

pub use capability::{Capability, CapabilityHandler, CapabilityRegistry};
pub use card::{AgentCard, AgentCardBuilder, AgentIdentity};
pub use client::{ClientError, ProtocolClient, RemoteAgent};
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use protocol::{RpcError, RpcErrorCode, RpcRequest, RpcResponse};
pub use resilience::ResilienceLayer;
pub use server::ProtocolServer;
pub use task::{Task, TaskStatus, TaskStore};
