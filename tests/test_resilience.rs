//! Resilience layer behavior around real capability handlers

use agentlink::capability::{CapabilityError, CapabilityRegistry};
use agentlink::config::ResilienceSection;
use agentlink::resilience::{BreakerState, ResilienceError, ResilienceLayer};
use agentlink::testing::mocks::{static_capability, FailingCapability, FlakyCapability};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn config(failure_threshold: u32, recovery_timeout_secs: u64) -> ResilienceSection {
    ResilienceSection {
        failure_threshold,
        recovery_timeout_secs,
        ..ResilienceSection::default()
    }
}

async fn run_through_layer(
    layer: &ResilienceLayer,
    registry: &Arc<CapabilityRegistry>,
    capability: &str,
    params: Value,
) -> Result<Value, ResilienceError> {
    let registry = Arc::clone(registry);
    let name = capability.to_string();
    let params_for_exec = params.clone();
    layer
        .invoke(capability, capability, &params, move || async move {
            registry.execute(&name, &params_for_exec).await
        })
        .await
}

#[tokio::test]
async fn test_breaker_opens_at_threshold_and_rejects_without_invoking() {
    let mut registry = CapabilityRegistry::new();
    let failing = FailingCapability::new("dependency down");
    let calls = failing.call_counter();
    registry
        .register(static_capability("volatile"), Arc::new(failing))
        .unwrap();
    let registry = Arc::new(registry);

    let layer = ResilienceLayer::new(config(3, 60));

    // Three failures open the breaker
    for i in 0..3 {
        let result =
            run_through_layer(&layer, &registry, "volatile", json!({"attempt": i})).await;
        assert!(matches!(result, Err(ResilienceError::Execution(_))));
    }
    assert_eq!(layer.breaker_state("volatile"), Some(BreakerState::Open));

    // Rejected while open, and the handler is never invoked
    let rejected =
        run_through_layer(&layer, &registry, "volatile", json!({"attempt": 100})).await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_breaker_recovers_through_half_open_probe() {
    // Fails 3 times (tripping a threshold-3 breaker), then succeeds
    let mut registry = CapabilityRegistry::new();
    let flaky = FlakyCapability::failing_times(3, json!({"ok": true}));
    registry
        .register(static_capability("volatile"), Arc::new(flaky))
        .unwrap();
    let registry = Arc::new(registry);

    let layer = ResilienceLayer::new(config(3, 0));

    for i in 0..3 {
        let _ = run_through_layer(&layer, &registry, "volatile", json!({"attempt": i})).await;
    }
    assert_eq!(layer.breaker_state("volatile"), Some(BreakerState::Open));

    // Past the recovery timeout one probe is admitted; the handler now
    // succeeds and the breaker closes
    tokio::time::sleep(Duration::from_millis(20)).await;
    let probe = run_through_layer(&layer, &registry, "volatile", json!({"attempt": 101})).await;
    assert_eq!(probe.unwrap(), json!({"ok": true}));
    assert_eq!(layer.breaker_state("volatile"), Some(BreakerState::Closed));
}

#[tokio::test]
async fn test_failed_probe_reopens_breaker() {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(
            static_capability("down"),
            Arc::new(FailingCapability::new("still down")),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let layer = ResilienceLayer::new(config(2, 0));

    for i in 0..2 {
        let _ = run_through_layer(&layer, &registry, "down", json!({"attempt": i})).await;
    }
    assert_eq!(layer.breaker_state("down"), Some(BreakerState::Open));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let probe = run_through_layer(&layer, &registry, "down", json!({"attempt": 10})).await;
    assert!(matches!(probe, Err(ResilienceError::Execution(_))));
    assert_eq!(layer.breaker_state("down"), Some(BreakerState::Open));
}

#[tokio::test]
async fn test_breakers_isolate_dependencies() {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(
            static_capability("broken"),
            Arc::new(FailingCapability::new("no")),
        )
        .unwrap();
    registry
        .register(
            static_capability("healthy"),
            Arc::new(agentlink::testing::mocks::MockCapability::returning(
                json!({"fine": true}),
            )),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let layer = ResilienceLayer::new(config(1, 60));

    let _ = run_through_layer(&layer, &registry, "broken", json!({})).await;
    assert_eq!(layer.breaker_state("broken"), Some(BreakerState::Open));

    // A tripped breaker for one dependency never gates another
    let result = run_through_layer(&layer, &registry, "healthy", json!({})).await;
    assert_eq!(result.unwrap(), json!({"fine": true}));
}

#[tokio::test]
async fn test_cache_serves_identical_call_with_reordered_params() {
    let mut registry = CapabilityRegistry::new();
    let mock = agentlink::testing::mocks::MockCapability::returning(json!({"answer": 42}));
    let calls = mock.call_counter();
    registry
        .register(static_capability("lookup"), Arc::new(mock))
        .unwrap();
    let registry = Arc::new(registry);

    let layer = ResilienceLayer::new(ResilienceSection::default());

    let first = run_through_layer(
        &layer,
        &registry,
        "lookup",
        json!({"query": "Paris", "limit": 3}),
    )
    .await
    .unwrap();
    // Same parameters, different order: must hit the same cache entry
    let second = run_through_layer(
        &layer,
        &registry,
        "lookup",
        json!({"limit": 3, "query": "Paris"}),
    )
    .await
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_ttl_override_disables_caching_for_method() {
    let mut registry = CapabilityRegistry::new();
    let mock = agentlink::testing::mocks::MockCapability::returning(json!({"fresh": true}));
    let calls = mock.call_counter();
    registry
        .register(static_capability("volatile_data"), Arc::new(mock))
        .unwrap();
    let registry = Arc::new(registry);

    let mut section = ResilienceSection::default();
    section.cache_ttl_overrides = HashMap::from([("volatile_data".to_string(), 0)]);
    let layer = ResilienceLayer::new(section);

    for _ in 0..2 {
        // Entries expire instantly, so every call reaches the handler
        tokio::time::sleep(Duration::from_millis(5)).await;
        run_through_layer(&layer, &registry, "volatile_data", json!({}))
            .await
            .unwrap();
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_validation_errors_flow_through_layer() {
    let mut registry = CapabilityRegistry::new();
    let descriptor = agentlink::capability::Capability {
        name: "strict".to_string(),
        description: "Strict schema".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}},
            "required": ["n"]
        }),
        output_schema: json!({"type": "object"}),
        examples: vec![],
    };
    registry
        .register(
            descriptor,
            Arc::new(agentlink::testing::mocks::MockCapability::returning(json!({}))),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let layer = ResilienceLayer::new(ResilienceSection::default());
    let result = run_through_layer(&layer, &registry, "strict", json!({"n": "nope"})).await;

    match result {
        Err(ResilienceError::Execution(CapabilityError::Validation(message))) => {
            assert!(message.contains("n"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}
