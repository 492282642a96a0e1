//! JSON-RPC 2.0 protocol layer for Agent2Agent communication
//!
//! Defines the wire envelopes exchanged between agents along with the
//! standard error codes. Envelopes are validated once at the boundary and
//! handled as typed values everywhere downstream.

pub mod envelope;

pub use envelope::{
    validate_request, validate_response, EnvelopeError, RpcError, RpcErrorCode, RpcFailure,
    RpcRequest, RpcResponse, RpcSuccess, JSONRPC_VERSION,
};
