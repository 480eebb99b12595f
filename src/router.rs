//! HTTP surface: the browser client and the WebSocket endpoint

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;
use crate::ws;

/// Build the application router.
///
/// `/` serves the client page to browsers and upgrades WebSocket requests,
/// so the client can connect to the same origin it was loaded from.
pub fn build_router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(ws::ws_handler))
        .fallback_service(assets)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| ws::handle_socket(socket, state))
            .into_response(),
        Err(_) => serve_index(&state.static_dir).await,
    }
}

/// Handler body for index.html
async fn serve_index(static_dir: &Path) -> Response {
    match tokio::fs::read_to_string(static_dir.join("index.html")).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::warn!("index.html not found in {}: {}", static_dir.display(), e);
            (StatusCode::NOT_FOUND, "Client page not found").into_response()
        }
    }
}
