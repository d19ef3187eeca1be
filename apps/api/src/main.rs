use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vaidya_api::config::Config;
use vaidya_api::db::create_pool;
use vaidya_api::llm_client::{self, LlmClient};
use vaidya_api::routes::build_router;
use vaidya_api::state::AppState;
use vaidya_api::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vaidya API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (migrations run on connect)
    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    // Initialize LLM gateway client
    let gateway = Arc::new(LlmClient::new(
        config.gateway_api_key.clone(),
        config.gateway_url.clone(),
    )?);
    info!(
        "LLM client initialized (model: {}, endpoint: {})",
        llm_client::MODEL,
        config.gateway_url
    );

    let app = build_router(AppState::new(store, gateway));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
