use anyhow::Result;
use confab::agent::Agent;
use confab::providers::factory;
use confab::remote::RemoteToolset;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration from the environment
    let settings = Settings::new()?;
    let addr = settings.server.socket_addr();

    // Assemble the agent once at startup: provider, tool backend, turn
    // options. Tool discovery happens here, not per request.
    let provider = factory::get_provider(settings.provider.into_config())?;
    let mut agent = Agent::new(provider).with_config(settings.turn.into_config());
    if let Some(tools) = settings.tools {
        let toolset = RemoteToolset::connect(tools.into_config()).await?;
        agent.add_toolset(Box::new(toolset));
    }

    let state = AppState::new(agent);

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
