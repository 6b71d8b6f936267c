// Company Tracker - Web Server

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use company_tracker::api::{router, AppState};
use company_tracker::{Config, Store};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("company_tracker=debug,company_server=debug,tower_http=info")),
        )
        .with_target(true)
        .init();

    if let Err(e) = run(config).await {
        error!("server error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    info!("🌐 Company Tracker - Web Server");

    let store = Arc::new(Store::open(&config.database_path)?);
    info!("✓ Database opened: {:?}", config.database_path);

    let app = router(AppState::new(store.clone()), &config.static_dir);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   API: http://{}/api/companies", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    info!("shutting down, closing database");
    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => warn!("store still shared at shutdown; leaving connection to drop"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
