// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::hub::HubHandle;

pub use ws::WsConnection;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) hub: HubHandle<WsConnection>,
}

pub fn app(hub: HubHandle<WsConnection>, config: &AppConfig) -> Router {
    let state = AppState { hub };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/api/stats", get(http::stats_handler)) // GET /api/stats
        .route("/ws", get(ws::ws_dashboard)) // WS /ws
        .fallback_service(ServeDir::new(&config.assets.dir)) // dashboard assets
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
