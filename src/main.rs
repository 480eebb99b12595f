use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cxbridge::{config::BridgeConfig, dialogflow::CxSessionsClient, router, state::AppState};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cxbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BridgeConfig::from_env();

    let client = match CxSessionsClient::new(&config.dialogflow) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to initialize Dialogflow client: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(Arc::new(client), &config));
    let app = router::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running");
    tracing::info!("UI available at http://localhost:{}", config.port);
    tracing::info!("WebSocket listening on ws://localhost:{}", config.port);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
