//! Configuration system for the Agent2Agent protocol node
//!
//! Loads `agent.toml` with sections for agent identity, HTTP server binding,
//! resilience tuning, and the capability table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Main agent configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub agent: AgentSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub resilience: ResilienceSection,
    #[serde(default)]
    pub capabilities: HashMap<String, CapabilityConfig>,
}

/// Agent identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    /// Agent identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Human-readable agent name
    pub name: String,
    /// Description of what this agent does
    pub description: String,
    /// Agent version advertised in the discovery document
    #[serde(default = "default_version")]
    pub version: String,
    /// Discovery document time-to-live in seconds
    #[serde(default = "default_card_ttl")]
    pub card_ttl_secs: u64,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_card_ttl() -> u64 {
    3600
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public endpoint advertised in the discovery document
    pub public_endpoint: Option<String>,
    /// How long terminal tasks are retained before eviction (seconds)
    #[serde(default = "default_task_retention")]
    pub task_retention_secs: u64,
    /// Interval between background sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_endpoint: None,
            task_retention_secs: default_task_retention(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ServerSection {
    /// Endpoint to advertise: explicit public endpoint or the bind address
    pub fn advertised_endpoint(&self) -> String {
        self.public_endpoint
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_task_retention() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    30
}

/// Resilience layer tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResilienceSection {
    /// Global token bucket capacity
    #[serde(default = "default_global_capacity")]
    pub global_capacity: f64,
    /// Global bucket refill rate (tokens per second)
    #[serde(default = "default_global_refill")]
    pub global_refill_per_sec: f64,
    /// Per-method token bucket capacity
    #[serde(default = "default_method_capacity")]
    pub method_capacity: f64,
    /// Per-method bucket refill rate (tokens per second)
    #[serde(default = "default_method_refill")]
    pub method_refill_per_sec: f64,
    /// Consecutive failures before a breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds an open breaker waits before admitting a probe
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
    /// Maximum cached responses
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Default cache entry TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_default_ttl_secs: u64,
    /// Per-method cache TTL overrides in seconds
    #[serde(default)]
    pub cache_ttl_overrides: HashMap<String, u64>,
}

impl Default for ResilienceSection {
    fn default() -> Self {
        Self {
            global_capacity: default_global_capacity(),
            global_refill_per_sec: default_global_refill(),
            method_capacity: default_method_capacity(),
            method_refill_per_sec: default_method_refill(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
            cache_size: default_cache_size(),
            cache_default_ttl_secs: default_cache_ttl(),
            cache_ttl_overrides: HashMap::new(),
        }
    }
}

fn default_global_capacity() -> f64 {
    100.0
}

fn default_global_refill() -> f64 {
    100.0 / 60.0
}

fn default_method_capacity() -> f64 {
    50.0
}

fn default_method_refill() -> f64 {
    50.0 / 60.0
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

fn default_cache_size() -> usize {
    1000
}

fn default_cache_ttl() -> u64 {
    300
}

/// Capability table entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CapabilityConfig {
    /// Simple form: capability_name = "identifier"
    Simple(String),
    /// Complex form: capability_name = { impl = "identifier", config = { ... } }
    Complex {
        #[serde(rename = "impl")]
        implementation: String,
        #[serde(default)]
        config: HashMap<String, serde_json::Value>,
    },
}

impl CapabilityConfig {
    /// Implementation identifier regardless of form
    pub fn implementation(&self) -> &str {
        match self {
            CapabilityConfig::Simple(implementation) => implementation,
            CapabilityConfig::Complex { implementation, .. } => implementation,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid agent ID format: {0}")]
    InvalidAgentId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;

        validate_agent_id(&config.agent.id)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resilience.failure_threshold == 0 {
            return Err(ConfigError::InvalidConfig(
                "resilience.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.resilience.cache_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "resilience.cache_size must be at least 1".to_string(),
            ));
        }
        if self.resilience.global_capacity <= 0.0 || self.resilience.method_capacity <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "rate limit bucket capacities must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[agent]
id = "test-agent"
name = "Test Agent"
description = "A test agent"

[server]
host = "127.0.0.1"
port = 0

[capabilities]
search_locations = "builtin"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate agent ID format
fn validate_agent_id(agent_id: &str) -> Result<(), ConfigError> {
    let valid_chars = agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if agent_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidAgentId(format!(
            "Agent ID '{agent_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let toml_content = r#"
[agent]
id = "weather-agent-001"
name = "Weather Agent"
description = "Weather information over A2A"
version = "1.2.0"

[server]
host = "127.0.0.1"
port = 8001
task_retention_secs = 120

[resilience]
failure_threshold = 3
recovery_timeout_secs = 30
cache_size = 64

[resilience.cache_ttl_overrides]
search_locations = 3600
get_current_weather = 300

[capabilities]
search_locations = "builtin"
get_current_weather = { impl = "builtin", config = { units = "metric" } }
"#;

        let config: AgentConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.agent.id, "weather-agent-001");
        assert_eq!(config.agent.version, "1.2.0");
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.server.task_retention_secs, 120);
        assert_eq!(config.resilience.failure_threshold, 3);
        assert_eq!(
            config.resilience.cache_ttl_overrides.get("search_locations"),
            Some(&3600)
        );
        assert_eq!(config.capabilities.len(), 2);
        assert_eq!(
            config.capabilities["get_current_weather"].implementation(),
            "builtin"
        );
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_content = r#"
[agent]
id = "minimal"
name = "Minimal"
description = "Minimal agent"
"#;

        let config: AgentConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.agent.version, "1.0.0");
        assert_eq!(config.agent.card_ttl_secs, 3600);
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.resilience.failure_threshold, 5);
        assert!(config.capabilities.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"
[agent]
id = "file-agent"
name = "File Agent"
description = "Loaded from disk"
"#,
        )
        .unwrap();

        let config = AgentConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.agent.id, "file-agent");
    }

    #[test]
    fn test_load_from_file_rejects_bad_agent_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"
[agent]
id = "bad agent id!"
name = "Bad"
description = "Invalid id"
"#,
        )
        .unwrap();

        let result = AgentConfig::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::InvalidAgentId(_))));
    }

    #[test]
    fn test_invalid_agent_id() {
        assert!(validate_agent_id("invalid@agent").is_err());
        assert!(validate_agent_id("").is_err());
        assert!(validate_agent_id("valid-agent_123.test").is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = AgentConfig::test_config();
        config.resilience.failure_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_advertised_endpoint_prefers_public() {
        let mut section = ServerSection::default();
        assert_eq!(section.advertised_endpoint(), "http://0.0.0.0:8001");

        section.public_endpoint = Some("https://agents.example.com".to_string());
        assert_eq!(section.advertised_endpoint(), "https://agents.example.com");
    }
}
