//! Agent card generation for A2A discovery
//!
//! The agent card is the discovery document served at
//! `/.well-known/agent.json`. It is regenerated on demand from the current
//! registry state; capability order always matches registration order, so
//! the document is deterministic apart from its `last_updated` stamp.

use crate::capability::{Capability, CapabilityRegistry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Management methods every node answers in addition to its capabilities
pub const MANAGEMENT_METHODS: &[&str] = &[
    "get_agent_info",
    "get_capabilities",
    "submit_task",
    "get_task_status",
    "cancel_task",
];

/// Path at which the card is served
pub const WELL_KNOWN_PATH: &str = "/.well-known/agent.json";

/// Agent identity block of the card
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardAgent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub status: String,
    pub endpoint: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Endpoint map advertised under `communication`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardEndpoints {
    pub rpc: String,
    pub health: String,
    pub status: String,
    pub tasks: String,
}

/// Communication block: protocol, transport, endpoints, methods
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardCommunication {
    pub protocol: String,
    pub transport: String,
    pub endpoints: CardEndpoints,
    pub supported_methods: Vec<String>,
}

/// Discovery metadata block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardDiscovery {
    pub well_known_path: String,
    pub last_updated: String,
    pub ttl: u64,
}

/// Authentication advertisement (hooks only, not enforced)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardAuthentication {
    pub required: bool,
    pub methods: Vec<String>,
}

/// Rate limiting advertisement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardRateLimiting {
    pub requests_per_minute: u64,
    pub burst_limit: u64,
}

/// The discovery document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    pub agent: CardAgent,
    pub capabilities: Vec<Capability>,
    pub communication: CardCommunication,
    pub discovery: CardDiscovery,
    pub authentication: CardAuthentication,
    pub rate_limiting: CardRateLimiting,
}

/// Identity inputs for card generation
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub endpoint: String,
    pub card_ttl_secs: u64,
}

/// Builds agent cards from identity plus current registry state
pub struct AgentCardBuilder {
    identity: AgentIdentity,
    registry: Arc<CapabilityRegistry>,
    requests_per_minute: u64,
}

impl AgentCardBuilder {
    pub fn new(identity: AgentIdentity, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            identity,
            registry,
            requests_per_minute: 60,
        }
    }

    /// Override the advertised rate limit
    pub fn with_requests_per_minute(mut self, requests_per_minute: u64) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Generate the discovery document from current registry state.
    ///
    /// An empty registry yields an empty capability list, not an error.
    pub fn build(&self) -> AgentCard {
        let endpoint = self.identity.endpoint.trim_end_matches('/');

        let mut supported_methods: Vec<String> = self.registry.names();
        supported_methods.extend(MANAGEMENT_METHODS.iter().map(|m| m.to_string()));

        AgentCard {
            agent: CardAgent {
                id: self.identity.id.clone(),
                name: self.identity.name.clone(),
                description: self.identity.description.clone(),
                version: self.identity.version.clone(),
                status: "active".to_string(),
                endpoint: endpoint.to_string(),
                metadata: serde_json::Map::new(),
            },
            capabilities: self.registry.descriptors().into_iter().cloned().collect(),
            communication: CardCommunication {
                protocol: "JSON-RPC 2.0".to_string(),
                transport: "HTTP".to_string(),
                endpoints: CardEndpoints {
                    rpc: format!("{endpoint}/rpc"),
                    health: format!("{endpoint}/health"),
                    status: format!("{endpoint}/status"),
                    tasks: format!("{endpoint}/tasks"),
                },
                supported_methods,
            },
            discovery: CardDiscovery {
                well_known_path: WELL_KNOWN_PATH.to_string(),
                last_updated: Utc::now().to_rfc3339(),
                ttl: self.identity.card_ttl_secs,
            },
            authentication: CardAuthentication {
                required: false,
                methods: vec!["none".to_string()],
            },
            rate_limiting: CardRateLimiting {
                requests_per_minute: self.requests_per_minute,
                burst_limit: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{static_capability, MockCapability};
    use serde_json::json;

    fn identity() -> AgentIdentity {
        AgentIdentity {
            id: "weather-agent-001".to_string(),
            name: "Weather Agent".to_string(),
            description: "Weather over A2A".to_string(),
            version: "1.0.0".to_string(),
            endpoint: "http://localhost:8001".to_string(),
            card_ttl_secs: 3600,
        }
    }

    #[test]
    fn test_empty_registry_yields_empty_capability_list() {
        let builder = AgentCardBuilder::new(identity(), Arc::new(CapabilityRegistry::new()));
        let card = builder.build();

        assert!(card.capabilities.is_empty());
        assert_eq!(card.agent.id, "weather-agent-001");
        assert_eq!(card.communication.protocol, "JSON-RPC 2.0");
        // Management methods are always advertised
        assert_eq!(
            card.communication.supported_methods.len(),
            MANAGEMENT_METHODS.len()
        );
    }

    #[test]
    fn test_capability_order_matches_registration_order() {
        let mut registry = CapabilityRegistry::new();
        for name in ["search_locations", "get_current_weather", "get_forecast"] {
            registry
                .register(
                    static_capability(name),
                    Arc::new(MockCapability::returning(json!({}))),
                )
                .unwrap();
        }
        let builder = AgentCardBuilder::new(identity(), Arc::new(registry));
        let card = builder.build();

        let names: Vec<&str> = card.capabilities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["search_locations", "get_current_weather", "get_forecast"]
        );
        // Capability methods lead the supported method list, registration order
        assert_eq!(card.communication.supported_methods[0], "search_locations");
    }

    #[test]
    fn test_endpoints_derived_from_base() {
        let builder = AgentCardBuilder::new(identity(), Arc::new(CapabilityRegistry::new()));
        let card = builder.build();

        assert_eq!(card.communication.endpoints.rpc, "http://localhost:8001/rpc");
        assert_eq!(
            card.communication.endpoints.tasks,
            "http://localhost:8001/tasks"
        );
        assert_eq!(card.discovery.well_known_path, WELL_KNOWN_PATH);
        assert_eq!(card.discovery.ttl, 3600);
    }

    #[test]
    fn test_card_is_deterministic_apart_from_timestamp() {
        let builder = AgentCardBuilder::new(identity(), Arc::new(CapabilityRegistry::new()));
        let mut first = builder.build();
        let mut second = builder.build();

        first.discovery.last_updated = String::new();
        second.discovery.last_updated = String::new();
        assert_eq!(first, second);
    }

    #[test]
    fn test_card_serializes_expected_sections() {
        let builder = AgentCardBuilder::new(identity(), Arc::new(CapabilityRegistry::new()));
        let value = serde_json::to_value(builder.build()).unwrap();

        assert!(value.get("agent").is_some());
        assert!(value.get("capabilities").is_some());
        assert!(value.get("communication").is_some());
        assert!(value.get("discovery").is_some());
        assert_eq!(value["authentication"]["required"], false);
    }
}
