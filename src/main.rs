//! Agent2Agent Protocol Node - Main Entry Point

use agentlink::capability::builtin::register_weather_capabilities;
use agentlink::capability::CapabilityRegistry;
use agentlink::config::AgentConfig;
use agentlink::observability::init_default_logging;
use agentlink::server::ProtocolServer;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Agent2Agent (A2A) discovery and task protocol node
#[derive(Parser)]
#[command(name = "agentlink")]
#[command(about = "Agent2Agent (A2A) protocol node")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the protocol server
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting agentlink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_server(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(AgentConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = ["agent.toml", "config/agent.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AgentConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create agent.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_server(config: AgentConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Starting A2A node with agent ID: {}", config.agent.id);

    let registry = build_registry(&config)?;
    info!(
        "Registered capabilities: {}",
        registry.names().join(", ")
    );

    let server = ProtocolServer::new(config, Arc::new(registry));
    server.run().await?;
    Ok(())
}

/// Build the capability registry from the configured capability table
fn build_registry(config: &AgentConfig) -> Result<CapabilityRegistry, Box<dyn std::error::Error + Send + Sync>> {
    let mut registry = CapabilityRegistry::new();

    let wants_builtin = config.capabilities.is_empty()
        || config
            .capabilities
            .values()
            .any(|c| c.implementation() == "builtin");
    if wants_builtin {
        register_weather_capabilities(&mut registry)?;
    }

    for (name, capability) in &config.capabilities {
        match capability.implementation() {
            "builtin" => {
                if !registry.contains(name) {
                    return Err(format!("Unknown builtin capability: {name}").into());
                }
            }
            other => {
                return Err(format!(
                    "Unknown capability implementation '{other}' for {name}"
                )
                .into())
            }
        }
    }

    Ok(registry)
}

fn handle_config_command(
    config: AgentConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
