pub mod api_routes;

use std::path::Path;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::service::chat_service::ChatService;
use api_routes::{chat_handler, health_handler};

/// Builds the application router. The compiled UI is served from `static_dir`
/// when that directory exists.
pub fn app(svc: ChatService, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(svc);

    if static_dir.is_dir() {
        info!("Serving UI from {}", static_dir.display());
        let index = static_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index)));
    }

    app
}
