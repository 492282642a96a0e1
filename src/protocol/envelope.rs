//! JSON-RPC 2.0 envelope types
//!
//! A request, a success response, and an error response are distinct types
//! joined by [`RpcResponse`]. Raw JSON is validated exactly once, at the
//! transport boundary, via [`validate_request`] (server side) and
//! [`validate_response`] (client side); downstream code never re-checks
//! envelope shape.
//!
//! # Examples
//! ```
//! use agentlink::protocol::validate_request;
//! use serde_json::json;
//!
//! let raw = json!({
//!     "jsonrpc": "2.0",
//!     "method": "get_capabilities",
//!     "id": "1"
//! });
//! let request = validate_request(&raw).unwrap();
//! assert_eq!(request.method, "get_capabilities");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Protocol version accepted and emitted by this crate
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    /// -32700: body was not parseable JSON
    ParseError,
    /// -32600: envelope shape or protocol version invalid
    InvalidRequest,
    /// -32601: method is not a management method or registered capability
    MethodNotFound,
    /// -32602: params rejected by the capability's input schema
    InvalidParams,
    /// -32603: handler failure or resilience rejection
    InternalError,
}

impl RpcErrorCode {
    /// Numeric wire code
    pub fn code(&self) -> i64 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
        }
    }
}

/// Validated inbound request envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    /// Always [`JSONRPC_VERSION`]
    pub jsonrpc: String,
    /// Method name: a management method or a capability name
    pub method: String,
    /// Method parameters; absent params behave as an empty object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Caller-chosen id echoed back in the response (string, number, or null)
    #[serde(default)]
    pub id: Value,
}

impl RpcRequest {
    /// Build a request with a freshly generated UUID id
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Value::String(Uuid::new_v4().to_string()),
        }
    }

    /// Build a request with an explicit id
    pub fn with_id(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Params as an object, defaulting to empty when absent
    pub fn params_object(&self) -> Value {
        self.params
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }
}

/// Error member of an error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: RpcErrorCode, message: impl Into<String>, data: Value) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Successful response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcSuccess {
    pub jsonrpc: String,
    pub result: Value,
    pub id: Value,
}

/// Error response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcFailure {
    pub jsonrpc: String,
    pub error: RpcError,
    pub id: Value,
}

/// Outbound response: exactly one of result or error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(RpcSuccess),
    Failure(RpcFailure),
}

impl RpcResponse {
    /// Build a success response echoing the request id
    pub fn success(id: Value, result: Value) -> Self {
        RpcResponse::Success(RpcSuccess {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            id,
        })
    }

    /// Build an error response echoing the request id (null when unreadable)
    pub fn failure(id: Value, error: RpcError) -> Self {
        RpcResponse::Failure(RpcFailure {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error,
            id,
        })
    }

    /// Request id carried by this response
    pub fn id(&self) -> &Value {
        match self {
            RpcResponse::Success(s) => &s.id,
            RpcResponse::Failure(f) => &f.id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RpcResponse::Success(_))
    }
}

/// Boundary validation failures
#[derive(Debug, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("envelope must be a JSON object")]
    NotAnObject,
    #[error("unsupported protocol version: {0}")]
    WrongVersion(String),
    #[error("method is missing or not a string")]
    BadMethod,
    #[error("response must carry exactly one of result or error")]
    AmbiguousOutcome,
    #[error("response is missing an id")]
    MissingId,
    #[error("request id must be a string, number, or null")]
    BadId,
}

/// Validate a decoded JSON value as a request envelope.
///
/// Enforces: object shape, `jsonrpc == "2.0"`, `method` present and a
/// string, and an id that is a string, number, or null when present.
pub fn validate_request(raw: &Value) -> Result<RpcRequest, EnvelopeError> {
    let obj = raw.as_object().ok_or(EnvelopeError::NotAnObject)?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => return Err(EnvelopeError::WrongVersion(other.to_string())),
        None => return Err(EnvelopeError::WrongVersion("missing".to_string())),
    }

    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::BadMethod)?
        .to_string();

    let id = obj.get("id").cloned().unwrap_or(Value::Null);
    if !matches!(id, Value::Null | Value::String(_) | Value::Number(_)) {
        return Err(EnvelopeError::BadId);
    }

    Ok(RpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method,
        params: obj.get("params").cloned(),
        id,
    })
}

/// Validate a decoded JSON value as a response envelope.
///
/// A well-formed response carries the protocol version, an id, and exactly
/// one of `result` / `error`. Anything else is a shape violation the caller
/// must treat as a local error, distinct from a remote RPC error.
pub fn validate_response(raw: &Value) -> Result<RpcResponse, EnvelopeError> {
    let obj = raw.as_object().ok_or(EnvelopeError::NotAnObject)?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => return Err(EnvelopeError::WrongVersion(other.to_string())),
        None => return Err(EnvelopeError::WrongVersion("missing".to_string())),
    }

    let id = obj.get("id").cloned().ok_or(EnvelopeError::MissingId)?;

    match (obj.get("result"), obj.get("error")) {
        (Some(result), None) => Ok(RpcResponse::success(id, result.clone())),
        (None, Some(error)) => {
            let error: RpcError = serde_json::from_value(error.clone())
                .map_err(|_| EnvelopeError::AmbiguousOutcome)?;
            Ok(RpcResponse::Failure(RpcFailure {
                jsonrpc: JSONRPC_VERSION.to_string(),
                error,
                id,
            }))
        }
        _ => Err(EnvelopeError::AmbiguousOutcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_request_accepts_well_formed_envelope() {
        let raw = json!({"jsonrpc": "2.0", "method": "submit_task", "params": {"a": 1}, "id": 7});
        let request = validate_request(&raw).unwrap();
        assert_eq!(request.method, "submit_task");
        assert_eq!(request.id, json!(7));
        assert_eq!(request.params_object(), json!({"a": 1}));
    }

    #[test]
    fn test_validate_request_rejects_wrong_version() {
        let raw = json!({"jsonrpc": "1.0", "method": "x", "id": 1});
        assert_eq!(
            validate_request(&raw),
            Err(EnvelopeError::WrongVersion("1.0".to_string()))
        );
    }

    #[test]
    fn test_validate_request_rejects_missing_method() {
        let raw = json!({"jsonrpc": "2.0", "id": 1});
        assert_eq!(validate_request(&raw), Err(EnvelopeError::BadMethod));
    }

    #[test]
    fn test_validate_request_rejects_non_string_method() {
        let raw = json!({"jsonrpc": "2.0", "method": 42, "id": 1});
        assert_eq!(validate_request(&raw), Err(EnvelopeError::BadMethod));
    }

    #[test]
    fn test_validate_request_rejects_structured_id() {
        let raw = json!({"jsonrpc": "2.0", "method": "x", "id": {"nested": true}});
        assert_eq!(validate_request(&raw), Err(EnvelopeError::BadId));
    }

    #[test]
    fn test_missing_id_defaults_to_null() {
        let raw = json!({"jsonrpc": "2.0", "method": "x"});
        let request = validate_request(&raw).unwrap();
        assert_eq!(request.id, Value::Null);
    }

    #[test]
    fn test_validate_response_success_shape() {
        let raw = json!({"jsonrpc": "2.0", "result": {"ok": true}, "id": "1"});
        let response = validate_response(&raw).unwrap();
        assert!(response.is_success());
        assert_eq!(response.id(), &json!("1"));
    }

    #[test]
    fn test_validate_response_error_shape() {
        let raw = json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found"},
            "id": "1"
        });
        match validate_response(&raw).unwrap() {
            RpcResponse::Failure(failure) => {
                assert_eq!(failure.error.code, RpcErrorCode::MethodNotFound.code());
            }
            RpcResponse::Success(_) => panic!("expected failure envelope"),
        }
    }

    #[test]
    fn test_validate_response_rejects_both_result_and_error() {
        let raw = json!({
            "jsonrpc": "2.0",
            "result": 1,
            "error": {"code": -32603, "message": "boom"},
            "id": "1"
        });
        assert_eq!(
            validate_response(&raw),
            Err(EnvelopeError::AmbiguousOutcome)
        );
    }

    #[test]
    fn test_validate_response_rejects_missing_id() {
        let raw = json!({"jsonrpc": "2.0", "result": 1});
        assert_eq!(validate_response(&raw), Err(EnvelopeError::MissingId));
    }

    #[test]
    fn test_response_roundtrip_serialization() {
        let response = RpcResponse::success(json!("abc"), json!({"n": 3}));
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["result"]["n"], 3);
        assert_eq!(encoded["id"], "abc");
        assert!(encoded.get("error").is_none());
    }

    #[test]
    fn test_error_codes_match_wire_values() {
        assert_eq!(RpcErrorCode::ParseError.code(), -32700);
        assert_eq!(RpcErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(RpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(RpcErrorCode::InvalidParams.code(), -32602);
        assert_eq!(RpcErrorCode::InternalError.code(), -32603);
    }
}
