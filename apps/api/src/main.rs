mod agents;
mod config;
mod errors;
mod flow;
mod llm_gateway;
mod models;
mod routes;
mod session;
mod state;
mod stores;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agents::AGENT_KEYS;
use crate::config::{Config, ConfigDoc};
use crate::flow::FlowManager;
use crate::llm_gateway::{Gateway, HttpTransport};
use crate::routes::build_router;
use crate::session::SessionRegistry;
use crate::state::AppState;
use crate::stores::{InMemoryCandidateStore, InMemoryRubricStore, SeedDoc};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (a malformed document fails startup)
    let config = Config::from_env()?;
    let doc = ConfigDoc::load(&config.engine_config_path)?;
    let registry = doc.resolve_registry(AGENT_KEYS)?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Parley API v{}", env!("CARGO_PKG_VERSION"));

    // The gateway owns the only network egress towards LLM providers
    let gateway = Gateway::new(Arc::new(HttpTransport::new()), doc.llm.api_key_env.clone());
    info!("LLM gateway initialized ({} routes)", doc.routes.len());

    // In-memory collaborator stores, optionally seeded from disk
    let rubrics = Arc::new(InMemoryRubricStore::default());
    let candidates = Arc::new(InMemoryCandidateStore::default());
    if let Some(seed_path) = &config.seed_path {
        let seed = SeedDoc::load(seed_path)?;
        let (interviews, people) = seed.apply(&rubrics, &candidates).await;
        info!("Seeded {interviews} interviews and {people} candidates");
    }

    let sessions = Arc::new(SessionRegistry::new(
        doc.flow.session_timeout_minutes,
        doc.flow.complete_grace_minutes,
    ));
    let flow = Arc::new(FlowManager::new(gateway, &registry, doc.flow.clone()));

    let state = AppState {
        flow,
        sessions,
        rubrics,
        candidates,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
