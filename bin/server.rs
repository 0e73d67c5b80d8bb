// Zap Manejo - Webhook Server
// Receives WhatsApp Cloud API notifications and answers in chat

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zap_manejo::server::{router, AppState};
use zap_manejo::{sender_from_config, setup_database, Config, MessageSender};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zap_manejo=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🌐 Zap Manejo - Webhook Server v{}", zap_manejo::VERSION);

    let config = Config::from_env()?;

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;
    setup_database(&conn)?;
    tracing::info!(path = ?config.db_path, "Database opened");

    // The blocking Graph API client must be built (and dropped) outside the runtime
    let sender: Arc<dyn MessageSender> = Arc::from(sender_from_config(&config)?);
    let state = AppState::new(conn, sender.clone(), config.hub_token.clone());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(serve(config, state));
    drop(sender);
    result
}

async fn serve(config: Config, state: AppState) -> Result<()> {
    if config.hub_token.is_none() {
        tracing::warn!("HUB_TOKEN not set, webhook subscription challenges will be refused");
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_addr);
    tracing::info!("   Webhook: http://{}/chat/message", config.bind_addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
