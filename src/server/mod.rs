//! A2A protocol HTTP server
//!
//! Serves the discovery document, health and status probes, task queries,
//! and the JSON-RPC endpoint. The server itself is state-machine free: all
//! task state lives in the [`TaskStore`], all resilience state in the
//! [`ResilienceLayer`]. Background sweeps run on a fixed interval
//! independent of request traffic.

use crate::capability::CapabilityRegistry;
use crate::card::{AgentCardBuilder, AgentIdentity};
use crate::config::AgentConfig;
use crate::observability::metrics::metrics;
use crate::resilience::ResilienceLayer;
use crate::task::TaskStore;
use chrono::Utc;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;
use warp::Filter;

pub mod dispatch;

pub use dispatch::{dispatch, handle_rpc_body};

/// Shared state behind every endpoint
pub struct ServerContext {
    pub agent_id: String,
    pub registry: Arc<CapabilityRegistry>,
    pub tasks: TaskStore,
    pub resilience: Arc<ResilienceLayer>,
    pub card: AgentCardBuilder,
    pub started_at: Instant,
}

impl ServerContext {
    /// Assemble server state from configuration and a populated registry
    pub fn new(config: &AgentConfig, registry: Arc<CapabilityRegistry>) -> Self {
        let identity = AgentIdentity {
            id: config.agent.id.clone(),
            name: config.agent.name.clone(),
            description: config.agent.description.clone(),
            version: config.agent.version.clone(),
            endpoint: config.server.advertised_endpoint(),
            card_ttl_secs: config.agent.card_ttl_secs,
        };

        Self {
            agent_id: config.agent.id.clone(),
            registry: Arc::clone(&registry),
            tasks: TaskStore::new(Duration::from_secs(config.server.task_retention_secs)),
            resilience: Arc::new(ResilienceLayer::new(config.resilience.clone())),
            card: AgentCardBuilder::new(identity, registry)
                .with_requests_per_minute((config.resilience.global_refill_per_sec * 60.0) as u64),
            started_at: Instant::now(),
        }
    }
}

/// A2A protocol server over HTTP
pub struct ProtocolServer {
    ctx: Arc<ServerContext>,
    config: AgentConfig,
}

impl ProtocolServer {
    pub fn new(config: AgentConfig, registry: Arc<CapabilityRegistry>) -> Self {
        let ctx = Arc::new(ServerContext::new(&config, registry));
        Self { ctx, config }
    }

    /// Shared context, for tests and embedding
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// All routes as a composable warp filter
    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        routes(Arc::clone(&self.ctx))
    }

    /// Bind to an address, returning the bound address and the server future.
    /// Port 0 picks an ephemeral port.
    pub fn bind(
        &self,
        addr: impl Into<SocketAddr>,
    ) -> (SocketAddr, impl std::future::Future<Output = ()>) {
        warp::serve(routes(Arc::clone(&self.ctx))).bind_ephemeral(addr)
    }

    /// Spawn the periodic sweeper for expired tasks and cache entries
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let interval = Duration::from_secs(self.config.server.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                ctx.resilience.sweep();
                ctx.tasks.sweep(Instant::now());
                debug!("background sweep complete");
            }
        })
    }

    /// Run until SIGINT/SIGTERM
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let host: std::net::IpAddr = self.config.server.host.parse()?;
        let addr = SocketAddr::new(host, self.config.server.port);

        let sweeper = self.spawn_sweeper();
        let (bound, server) = self.bind(addr);
        info!(%bound, agent_id = %self.ctx.agent_id, "A2A server listening");

        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            _ = server => {}
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }

        sweeper.abort();
        Ok(())
    }
}

/// Build the full route tree over a shared context
pub fn routes(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let card_ctx = Arc::clone(&ctx);
    let well_known = warp::path!(".well-known" / "agent.json")
        .and(warp::get())
        .map(move || warp::reply::json(&card_ctx.card.build()));

    let health_ctx = Arc::clone(&ctx);
    let health = warp::path!("health").and(warp::get()).map(move || {
        warp::reply::json(&json!({
            "status": "healthy",
            "agent_id": health_ctx.agent_id,
            "timestamp": Utc::now().to_rfc3339(),
            "active_tasks": health_ctx.tasks.active_count(),
        }))
    });

    let status_ctx = Arc::clone(&ctx);
    let status = warp::path!("status").and(warp::get()).map(move || {
        warp::reply::json(&json!({
            "agent_id": status_ctx.agent_id,
            "status": "active",
            "capabilities": status_ctx.registry.names(),
            "active_tasks": status_ctx.tasks.active_count(),
            "total_tasks": status_ctx.tasks.len(),
            "uptime_seconds": status_ctx.started_at.elapsed().as_secs(),
        }))
    });

    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .map(|| warp::reply::json(&metrics().get_metrics()));

    let list_ctx = Arc::clone(&ctx);
    let tasks_list = warp::path!("tasks").and(warp::get()).map(move || {
        let tasks = list_ctx.tasks.list();
        warp::reply::json(&json!({
            "count": tasks.len(),
            "tasks": tasks,
        }))
    });

    let detail_ctx = Arc::clone(&ctx);
    let task_detail = warp::path!("tasks" / String)
        .and(warp::get())
        .map(move |raw_id: String| {
            let task = Uuid::parse_str(&raw_id)
                .ok()
                .and_then(|id| detail_ctx.tasks.get(&id));
            match task {
                Some(task) => warp::reply::with_status(
                    warp::reply::json(&task),
                    warp::http::StatusCode::OK,
                ),
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"error": "Task not found"})),
                    warp::http::StatusCode::NOT_FOUND,
                ),
            }
        });

    let rpc_ctx = Arc::clone(&ctx);
    let rpc = warp::path!("rpc")
        .and(warp::post())
        .and(warp::body::bytes())
        .and_then(move |body: bytes::Bytes| {
            let ctx = Arc::clone(&rpc_ctx);
            async move {
                let response = handle_rpc_body(&ctx, body.as_ref()).await;
                Ok::<_, Infallible>(warp::reply::json(&response))
            }
        });

    well_known
        .or(health)
        .or(status)
        .or(metrics_route)
        .or(task_detail)
        .or(tasks_list)
        .or(rpc)
        .with(warp::cors().allow_any_origin())
}
