//! Error types for the Agent2Agent protocol node
//!
//! Maps internal failures to JSON-RPC error codes for the wire. Outbound
//! error messages are sanitized before leaving the process.

use crate::protocol::{RpcError, RpcErrorCode};
use thiserror::Error;

/// Main error type for protocol node operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Capability execution failed: {message}")]
    CapabilityFailed { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Cannot cancel completed task: {task_id} is {status}")]
    TaskAlreadyTerminal { task_id: String, status: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Capability error: {0}")]
    CapabilityError(#[from] crate::capability::CapabilityError),
}

impl AgentError {
    /// Convert to a wire-ready JSON-RPC error, sanitizing the message
    pub fn to_rpc_error(&self) -> RpcError {
        let (code, message) = match self {
            AgentError::CapabilityFailed { message } => {
                (RpcErrorCode::InternalError, message.clone())
            }
            AgentError::InvalidInput { message } => (RpcErrorCode::InvalidParams, message.clone()),
            AgentError::TaskNotFound { task_id } => (
                RpcErrorCode::InvalidParams,
                format!("Task not found: {task_id}"),
            ),
            AgentError::TaskAlreadyTerminal { task_id, status } => (
                RpcErrorCode::InvalidParams,
                format!("Cannot cancel completed task: {task_id} is {status}"),
            ),
            AgentError::InternalError { message } => {
                (RpcErrorCode::InternalError, message.clone())
            }
            AgentError::ConfigError(e) => (
                RpcErrorCode::InternalError,
                format!("Configuration error: {e}"),
            ),
            AgentError::CapabilityError(e) => match e {
                crate::capability::CapabilityError::Validation(message) => {
                    (RpcErrorCode::InvalidParams, message.clone())
                }
                other => (RpcErrorCode::InternalError, other.to_string()),
            },
        };

        RpcError::new(code, sanitize_error_message(&message))
    }

    /// Create capability execution error
    pub fn capability_failed<S: Into<String>>(message: S) -> Self {
        Self::CapabilityFailed {
            message: message.into(),
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Sanitize error messages to prevent sensitive data leaking onto the wire
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    // Remove common secret patterns
    sanitized = regex::Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+")
        .unwrap()
        .replace_all(&sanitized, "${1}=***")
        .to_string();

    // Remove potential file paths that might contain sensitive info
    sanitized =
        regex::Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
            .unwrap()
            .replace_all(&sanitized, "/***REDACTED***/")
            .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let max_content_len = 500 - truncate_suffix.len();
        sanitized = format!("{}{}", &sanitized[..max_content_len], truncate_suffix);
    }

    sanitized
}

/// Result type for protocol node operations
pub type AgentResult<T> = Result<T, AgentError>;
