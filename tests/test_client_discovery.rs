//! Client-side discovery and RPC behavior against fake remote agents

use agentlink::client::{ClientError, ProtocolClient};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent_card(agent_id: &str) -> Value {
    json!({
        "agent": {
            "id": agent_id,
            "name": "Weather Agent",
            "description": "Weather over A2A",
            "version": "1.0.0",
            "status": "active",
        },
        "capabilities": [
            {
                "name": "search_locations",
                "description": "Search locations",
                "input_schema": {"type": "object"},
                "output_schema": {"type": "object"},
                "examples": []
            }
        ],
        "communication": {},
        "discovery": {"well_known_path": "/.well-known/agent.json", "ttl": 3600}
    })
}

async fn mock_agent(agent_id: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/agent.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_card(agent_id)))
        .mount(&server)
        .await;
    server
}

fn client() -> ProtocolClient {
    ProtocolClient::new(Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_discover_parses_and_caches_agent() {
    let remote = mock_agent("peer-1").await;
    let client = client();

    let agent = client.discover(&remote.uri()).await.unwrap();
    assert_eq!(agent.agent_id, "peer-1");
    assert_eq!(agent.endpoint, remote.uri());
    assert!(agent.has_capability("search_locations"));

    // Cached per agent id
    assert!(client.agent_by_id("peer-1").is_some());
    assert_eq!(client.agents_with_capability("search_locations").len(), 1);
}

#[tokio::test]
async fn test_discover_unreachable_endpoint_is_failure_not_panic() {
    let client = client();
    let result = client.discover("http://127.0.0.1:1").await;
    assert!(matches!(result, Err(ClientError::Discovery { .. })));
}

#[tokio::test]
async fn test_discover_malformed_document_is_failure() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/agent.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&remote)
        .await;

    let result = client().discover(&remote.uri()).await;
    match result {
        Err(ClientError::Discovery { reason, .. }) => {
            assert!(reason.contains("agent section"));
        }
        other => panic!("expected discovery failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bulk_discovery_isolates_dead_peer() {
    let alive_a = mock_agent("peer-a").await;
    let alive_b = mock_agent("peer-b").await;

    let endpoints = vec![
        alive_a.uri(),
        "http://127.0.0.1:1".to_string(),
        alive_b.uri(),
    ];
    let agents = client().discover_many(&endpoints).await;

    assert_eq!(agents.len(), 2);
    let mut ids: Vec<&str> = agents.iter().map(|a| a.agent_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["peer-a", "peer-b"]);
}

#[tokio::test]
async fn test_call_returns_result_on_success_envelope() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": {"pong": true},
            "id": "any"
        })))
        .mount(&remote)
        .await;

    let result = client().call(&remote.uri(), "ping", None).await.unwrap();
    assert_eq!(result, json!({"pong": true}));
}

#[tokio::test]
async fn test_call_surfaces_remote_rpc_error() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found: ping"},
            "id": "any"
        })))
        .mount(&remote)
        .await;

    let result = client().call(&remote.uri(), "ping", None).await;
    match result {
        Err(ClientError::Rpc { code, message, .. }) => {
            assert_eq!(code, -32601);
            assert!(message.contains("ping"));
        }
        other => panic!("expected remote RPC error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_rejects_malformed_envelope_as_local_error() {
    let remote = MockServer::start().await;
    // Both result and error present: not a valid envelope
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": 1,
            "error": {"code": -32603, "message": "boom"},
            "id": "any"
        })))
        .mount(&remote)
        .await;

    let result = client().call(&remote.uri(), "ping", None).await;
    assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_poll_until_done_times_out_on_stuck_task() {
    let remote = MockServer::start().await;
    let task_id = uuid::Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "get_task_status"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": {
                "task_id": task_id.to_string(),
                "agent_id": "peer-1",
                "capability": "slow",
                "input_data": {},
                "status": "working",
                "result": null,
                "error": null,
                "created_at": "2026-08-07T00:00:00Z",
                "updated_at": "2026-08-07T00:00:00Z"
            },
            "id": "any"
        })))
        .mount(&remote)
        .await;

    let result = client()
        .poll_until_done(
            &remote.uri(),
            task_id,
            Duration::from_millis(150),
            Duration::from_millis(50),
        )
        .await;

    match result {
        Err(ClientError::PollTimeout { task_id: id, .. }) => assert_eq!(id, task_id),
        other => panic!("expected poll timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_poll_until_done_returns_failed_task_as_snapshot() {
    let remote = MockServer::start().await;
    let task_id = uuid::Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": {
                "task_id": task_id.to_string(),
                "agent_id": "peer-1",
                "capability": "slow",
                "input_data": {},
                "status": "failed",
                "result": null,
                "error": "downstream exploded",
                "created_at": "2026-08-07T00:00:00Z",
                "updated_at": "2026-08-07T00:00:01Z"
            },
            "id": "any"
        })))
        .mount(&remote)
        .await;

    // A Failed task is a successful poll, distinct from a timeout
    let task = client()
        .poll_until_done(
            &remote.uri(),
            task_id,
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    assert_eq!(task.status, agentlink::task::TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("downstream exploded"));
}
