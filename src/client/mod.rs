//! Outbound A2A protocol client
//!
//! Discovers remote agents through their well-known documents, sends
//! JSON-RPC requests, and drives asynchronous tasks to completion by
//! polling. Response envelopes are shape-validated before use: a malformed
//! envelope is a local [`ClientError::InvalidResponse`], distinct from a
//! remote [`ClientError::Rpc`] error. Discovery failures are isolated per
//! peer so a bulk sweep never aborts on one dead endpoint.

use crate::capability::Capability;
use crate::protocol::{validate_response, RpcRequest, RpcResponse};
use crate::task::{Task, TaskStatus};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// A remote agent as seen through its discovery document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteAgent {
    pub agent_id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub status: String,
    /// Endpoint the agent was discovered at
    pub endpoint: String,
    pub capabilities: Vec<Capability>,
}

impl RemoteAgent {
    /// Whether the agent advertises a capability by name
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }
}

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("Discovery failed for {endpoint}: {reason}")]
    Discovery { endpoint: String, reason: String },
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("Task submission did not return a task id")]
    MissingTaskId,
    #[error("Timed out waiting for task {task_id} after {waited_secs}s")]
    PollTimeout { task_id: Uuid, waited_secs: u64 },
    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: Uuid, message: String },
    #[error("Task {task_id} was cancelled")]
    TaskCancelled { task_id: Uuid },
}

/// A2A protocol client with pooled outbound connections
pub struct ProtocolClient {
    http: reqwest::Client,
    discovered: RwLock<HashMap<String, RemoteAgent>>,
}

impl ProtocolClient {
    /// Create a client with a request timeout and a keep-alive pool
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self {
            http,
            discovered: RwLock::new(HashMap::new()),
        })
    }

    /// Create a client with a 30 second timeout
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(Duration::from_secs(30))
    }

    /// Fetch and parse a remote agent's discovery document, caching the
    /// result per agent id. Failures are reported, never panicked.
    pub async fn discover(&self, endpoint: &str) -> Result<RemoteAgent, ClientError> {
        debug!(endpoint, "discovering agent");
        let url = join_endpoint(endpoint, crate::card::WELL_KNOWN_PATH)?;

        let document: Value = async {
            let response = self.http.get(url).send().await?.error_for_status()?;
            response.json::<Value>().await
        }
        .await
        .map_err(|e: reqwest::Error| ClientError::Discovery {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let agent = parse_agent_card(endpoint, &document)?;
        info!(
            agent_id = %agent.agent_id,
            capabilities = agent.capabilities.len(),
            "discovered agent"
        );

        self.discovered
            .write()
            .unwrap()
            .insert(agent.agent_id.clone(), agent.clone());
        Ok(agent)
    }

    /// Discover several peers concurrently, collecting only the successes.
    /// One unreachable peer never aborts the sweep.
    pub async fn discover_many(&self, endpoints: &[String]) -> Vec<RemoteAgent> {
        info!(count = endpoints.len(), "bulk discovery");
        let results = join_all(endpoints.iter().map(|e| self.discover(e))).await;

        let mut agents = Vec::new();
        for (endpoint, result) in endpoints.iter().zip(results) {
            match result {
                Ok(agent) => agents.push(agent),
                Err(e) => warn!(endpoint, error = %e, "discovery failed, skipping peer"),
            }
        }
        info!(discovered = agents.len(), "bulk discovery complete");
        agents
    }

    /// Send a JSON-RPC request and return the `result` member.
    ///
    /// The response is shape-validated first; envelope violations are a
    /// local error, a well-formed `error` member is a remote RPC error.
    pub async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.call_with_request(endpoint, RpcRequest::new(method, params))
            .await
    }

    /// Send a fully-specified request envelope
    pub async fn call_with_request(
        &self,
        endpoint: &str,
        request: RpcRequest,
    ) -> Result<Value, ClientError> {
        let url = join_endpoint(endpoint, "/rpc")?;
        debug!(endpoint, method = %request.method, "sending RPC request");

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let raw: Value = response.json().await?;

        match validate_response(&raw).map_err(|e| ClientError::InvalidResponse(e.to_string()))? {
            RpcResponse::Success(success) => Ok(success.result),
            RpcResponse::Failure(failure) => Err(ClientError::Rpc {
                code: failure.error.code,
                message: failure.error.message,
                data: failure.error.data,
            }),
        }
    }

    /// Submit a task for asynchronous execution, returning its id
    pub async fn submit_task(
        &self,
        endpoint: &str,
        capability: &str,
        input_data: Value,
    ) -> Result<Uuid, ClientError> {
        let result = self
            .call(
                endpoint,
                "submit_task",
                Some(json!({"capability": capability, "input_data": input_data})),
            )
            .await?;

        result
            .get("task_id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(ClientError::MissingTaskId)
    }

    /// Fetch a task snapshot
    pub async fn task_status(&self, endpoint: &str, task_id: Uuid) -> Result<Task, ClientError> {
        let result = self
            .call(
                endpoint,
                "get_task_status",
                Some(json!({"task_id": task_id.to_string()})),
            )
            .await?;

        serde_json::from_value(result)
            .map_err(|e| ClientError::InvalidResponse(format!("task snapshot: {e}")))
    }

    /// Request cancellation of a task
    pub async fn cancel_task(&self, endpoint: &str, task_id: Uuid) -> Result<(), ClientError> {
        self.call(
            endpoint,
            "cancel_task",
            Some(json!({"task_id": task_id.to_string()})),
        )
        .await?;
        Ok(())
    }

    /// Poll at a fixed interval until the task reaches a terminal state.
    ///
    /// Exceeding `max_wait` yields [`ClientError::PollTimeout`]; the task
    /// keeps running server-side. A Failed task is a successful poll and is
    /// returned as a snapshot, not an error.
    pub async fn poll_until_done(
        &self,
        endpoint: &str,
        task_id: Uuid,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Task, ClientError> {
        let started = Instant::now();

        loop {
            let task = self.task_status(endpoint, task_id).await?;
            if task.status.is_terminal() {
                debug!(%task_id, status = task.status.as_str(), "task reached terminal state");
                return Ok(task);
            }

            if started.elapsed() >= max_wait {
                warn!(%task_id, "gave up waiting for task");
                return Err(ClientError::PollTimeout {
                    task_id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Execute a capability as a direct synchronous call
    pub async fn execute_sync(
        &self,
        endpoint: &str,
        capability: &str,
        input_data: Value,
    ) -> Result<Value, ClientError> {
        self.call(endpoint, capability, Some(input_data)).await
    }

    /// Execute a capability by submitting a task and polling to completion
    pub async fn execute_async(
        &self,
        endpoint: &str,
        capability: &str,
        input_data: Value,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Value, ClientError> {
        let task_id = self.submit_task(endpoint, capability, input_data).await?;
        let task = self
            .poll_until_done(endpoint, task_id, max_wait, poll_interval)
            .await?;

        match task.status {
            TaskStatus::Completed => Ok(task.result.unwrap_or(Value::Null)),
            TaskStatus::Failed => Err(ClientError::TaskFailed {
                task_id,
                message: task.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
            TaskStatus::Cancelled => Err(ClientError::TaskCancelled { task_id }),
            // poll_until_done only returns terminal snapshots
            other => Err(ClientError::InvalidResponse(format!(
                "non-terminal status {} from poll",
                other.as_str()
            ))),
        }
    }

    /// All agents discovered so far
    pub fn discovered_agents(&self) -> Vec<RemoteAgent> {
        self.discovered.read().unwrap().values().cloned().collect()
    }

    /// Discovered agent by id
    pub fn agent_by_id(&self, agent_id: &str) -> Option<RemoteAgent> {
        self.discovered.read().unwrap().get(agent_id).cloned()
    }

    /// Discovered agents advertising a capability
    pub fn agents_with_capability(&self, capability: &str) -> Vec<RemoteAgent> {
        self.discovered
            .read()
            .unwrap()
            .values()
            .filter(|agent| agent.has_capability(capability))
            .cloned()
            .collect()
    }
}

fn join_endpoint(endpoint: &str, path: &str) -> Result<Url, ClientError> {
    let base = Url::parse(endpoint)?;
    Ok(base.join(path)?)
}

fn parse_agent_card(endpoint: &str, document: &Value) -> Result<RemoteAgent, ClientError> {
    let agent = document
        .get("agent")
        .and_then(Value::as_object)
        .ok_or_else(|| ClientError::Discovery {
            endpoint: endpoint.to_string(),
            reason: "document missing agent section".to_string(),
        })?;

    let text_field = |key: &str| -> Result<String, ClientError> {
        agent
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Discovery {
                endpoint: endpoint.to_string(),
                reason: format!("agent section missing {key}"),
            })
    };

    let capabilities: Vec<Capability> = document
        .get("capabilities")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ClientError::Discovery {
            endpoint: endpoint.to_string(),
            reason: format!("malformed capability list: {e}"),
        })?
        .unwrap_or_default();

    Ok(RemoteAgent {
        agent_id: text_field("id")?,
        name: text_field("name")?,
        description: text_field("description")?,
        version: text_field("version")?,
        status: agent
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        endpoint: endpoint.to_string(),
        capabilities,
    })
}
