//! JSON-RPC request dispatch
//!
//! Raw bytes in, response envelope out. Parse and envelope validation happen
//! here once; management methods and capability methods are routed to their
//! handlers, and every failure is converted to a deterministic error code.
//! Nothing in this module can take the server process down.

use crate::capability::CapabilityError;
use crate::error::{sanitize_error_message, AgentError};
use crate::observability::metrics::metrics;
use crate::protocol::{validate_request, RpcError, RpcErrorCode, RpcRequest, RpcResponse};
use crate::resilience::ResilienceError;
use crate::server::ServerContext;
use crate::task::{spawn_execution, TaskError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Handle a raw RPC request body
pub async fn handle_rpc_body(ctx: &Arc<ServerContext>, body: &[u8]) -> RpcResponse {
    metrics().record_rpc_request();

    let raw: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "unparseable RPC body");
            metrics().record_rpc_error();
            return RpcResponse::failure(
                Value::Null,
                RpcError::new(RpcErrorCode::ParseError, "Parse error"),
            );
        }
    };

    let request = match validate_request(&raw) {
        Ok(request) => request,
        Err(e) => {
            metrics().record_rpc_error();
            // Echo the id when it is readable, null otherwise
            let id = raw
                .get("id")
                .filter(|id| matches!(id, Value::Null | Value::String(_) | Value::Number(_)))
                .cloned()
                .unwrap_or(Value::Null);
            return RpcResponse::failure(
                id,
                RpcError::new(RpcErrorCode::InvalidRequest, format!("Invalid request: {e}")),
            );
        }
    };

    dispatch(ctx, request).await
}

/// Route a validated request to its handler
pub async fn dispatch(ctx: &Arc<ServerContext>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let params = request.params_object();
    debug!(method = %request.method, "dispatching RPC request");

    let outcome = match request.method.as_str() {
        "get_agent_info" => get_agent_info(ctx),
        "get_capabilities" => get_capabilities(ctx),
        "submit_task" => submit_task(ctx, &params),
        "get_task_status" => get_task_status(ctx, &params),
        "cancel_task" => cancel_task(ctx, &params),
        method if ctx.registry.contains(method) => call_capability(ctx, method, &params).await,
        method => {
            warn!(method, "method not found");
            Err(RpcError::new(
                RpcErrorCode::MethodNotFound,
                format!("Method not found: {method}"),
            ))
        }
    };

    match outcome {
        Ok(result) => RpcResponse::success(id, result),
        Err(error) => {
            metrics().record_rpc_error();
            RpcResponse::failure(id, error)
        }
    }
}

fn get_agent_info(ctx: &Arc<ServerContext>) -> Result<Value, RpcError> {
    let card = ctx.card.build();
    serde_json::to_value(card.agent)
        .map_err(|e| RpcError::new(RpcErrorCode::InternalError, e.to_string()))
}

fn get_capabilities(ctx: &Arc<ServerContext>) -> Result<Value, RpcError> {
    serde_json::to_value(ctx.registry.descriptors())
        .map_err(|e| RpcError::new(RpcErrorCode::InternalError, e.to_string()))
}

/// Create a task and schedule its execution without blocking the caller.
/// Capability existence is checked at execution time, not here.
fn submit_task(ctx: &Arc<ServerContext>, params: &Value) -> Result<Value, RpcError> {
    let capability = params
        .get("capability")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AgentError::invalid_input("Capability is required").to_rpc_error())?;
    let input_data = params
        .get("input_data")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    let task = ctx.tasks.submit(&ctx.agent_id, capability, input_data);
    spawn_execution(
        ctx.tasks.clone(),
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.resilience),
        task.id,
    );

    Ok(json!({
        "task_id": task.id,
        "status": task.status,
        "created_at": task.created_at.to_rfc3339(),
    }))
}

fn get_task_status(ctx: &Arc<ServerContext>, params: &Value) -> Result<Value, RpcError> {
    let task_id = parse_task_id(params)?;
    let task = ctx.tasks.get(&task_id).ok_or_else(|| {
        AgentError::TaskNotFound {
            task_id: task_id.to_string(),
        }
        .to_rpc_error()
    })?;

    serde_json::to_value(task)
        .map_err(|e| RpcError::new(RpcErrorCode::InternalError, e.to_string()))
}

fn cancel_task(ctx: &Arc<ServerContext>, params: &Value) -> Result<Value, RpcError> {
    let task_id = parse_task_id(params)?;
    match ctx.tasks.cancel(&task_id) {
        Ok(task) => Ok(json!({"task_id": task.id, "status": task.status})),
        Err(TaskError::NotFound { task_id }) => Err(AgentError::TaskNotFound {
            task_id: task_id.to_string(),
        }
        .to_rpc_error()),
        Err(TaskError::AlreadyTerminal { task_id, status }) => {
            Err(AgentError::TaskAlreadyTerminal {
                task_id: task_id.to_string(),
                status,
            }
            .to_rpc_error())
        }
        Err(e) => Err(AgentError::internal_error(e.to_string()).to_rpc_error()),
    }
}

fn parse_task_id(params: &Value) -> Result<Uuid, RpcError> {
    let raw = params
        .get("task_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::invalid_input("Task id is required").to_rpc_error())?;
    Uuid::parse_str(raw).map_err(|_| {
        AgentError::TaskNotFound {
            task_id: raw.to_string(),
        }
        .to_rpc_error()
    })
}

/// Synchronous capability invocation through the resilience layer
async fn call_capability(
    ctx: &Arc<ServerContext>,
    method: &str,
    params: &Value,
) -> Result<Value, RpcError> {
    metrics().record_sync_capability_call();

    let registry = Arc::clone(&ctx.registry);
    let method_owned = method.to_string();
    let params_owned = params.clone();
    let outcome = ctx
        .resilience
        .invoke(method, method, params, move || async move {
            registry.execute(&method_owned, &params_owned).await
        })
        .await;

    outcome.map_err(|e| resilience_error_to_rpc(method, e))
}

fn resilience_error_to_rpc(method: &str, error: ResilienceError) -> RpcError {
    match error {
        ResilienceError::RateLimited { scope } => RpcError::with_data(
            RpcErrorCode::InternalError,
            format!("Rate limit exceeded: {scope}"),
            json!({"rejection": "rate_limit", "scope": scope}),
        ),
        ResilienceError::CircuitOpen { dependency } => RpcError::with_data(
            RpcErrorCode::InternalError,
            format!("Circuit open for {dependency}"),
            json!({"rejection": "circuit_open", "dependency": dependency}),
        ),
        ResilienceError::Execution(CapabilityError::Validation(message)) => {
            RpcError::new(RpcErrorCode::InvalidParams, message)
        }
        ResilienceError::Execution(e) => RpcError::with_data(
            RpcErrorCode::InternalError,
            format!("Error executing {method}"),
            Value::String(sanitize_error_message(&e.to_string())),
        ),
    }
}
