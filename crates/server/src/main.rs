//! Datagrid server
//!
//! Serves jqGrid row payloads for the grids defined in `GRIDS_PATH`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use datagrid_server::{AppState, Config, app, session};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting datagrid server");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, grids = %config.grids_path.display(), "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let router: Router = match &config.redis_url {
        Some(redis_url) => {
            let layer = session::create_session_layer(redis_url)
                .await
                .context("failed to create session layer")?;
            info!("Sessions stored in Redis");
            app(state, layer)
        }
        None => {
            info!("REDIS_URL not set, sessions stored in memory");
            app(state, session::memory_session_layer())
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
