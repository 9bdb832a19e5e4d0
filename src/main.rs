//! toolrelay - tool-use orchestration for LLMs
//!
//! Drives the "ask model → detect tool call → dispatch → append result →
//! ask again" loop as an explicit state machine, over providers that return
//! tool calls either as typed blocks or embedded in plain text.

mod api;
mod config;
mod conversation;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use config::AppConfig;
use llm::ModelRegistry;
use runtime::RuntimeManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tools::{LocalToolProvider, ToolCatalog};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolrelay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No models configured. Set ANTHROPIC_API_KEY or OLLAMA_HOST.");
    }

    // The catalog is complete before the first session starts
    let catalog = Arc::new(ToolCatalog::load(Arc::new(LocalToolProvider::builtin())).await?);

    tracing::info!(
        max_iterations = config.loop_config.max_iterations,
        max_retries = config.loop_config.max_retries,
        tool_timeout_secs = config.loop_config.tool_timeout.as_secs(),
        cancel_policy = ?config.loop_config.cancel_policy,
        "Loop configured"
    );

    let runtime = Arc::new(RuntimeManager::new(
        llm_registry.clone(),
        catalog,
        config.loop_config,
    ));
    let state = AppState::new(runtime, llm_registry);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("toolrelay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
