use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use tracing::{debug, error, warn};

use crate::backend::FragmentStream;
use crate::errors::AppError;
use crate::models::ChatRequest;
use crate::service::chat_service::ChatService;

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/chat` — relays the message upstream and streams the reply back as plain text
pub async fn chat_handler(
    State(svc): State<ChatService>,
    Json(request): Json<ChatRequest>,
) -> Response {
    match svc.stream_reply(request).await {
        Ok(fragments) => text_stream(fragments, svc.backend_name().to_string()),
        Err(err) => {
            if err.is_upstream() {
                error!(backend = svc.backend_name(), "Failed to open model stream: {err}");
            } else {
                warn!("Rejected chat request: {err}");
            }
            err.into_response()
        }
    }
}

/// GET `/health`
pub async fn health_handler() -> &'static str {
    "ok"
}

// ── Helper ────────────────────────────────────────────────────────────────────

/// Re-frames each fragment as a UTF-8 body chunk. A mid-stream failure aborts
/// the body so the client sees a broken transfer rather than a short reply.
fn text_stream(fragments: FragmentStream, backend: String) -> Response {
    let body = fragments.map(move |item| match item {
        Ok(fragment) => Ok(Bytes::from(fragment)),
        Err(err) => {
            error!(backend = %backend, "Model stream failed mid-response: {err}");
            Err::<Bytes, AppError>(err)
        }
    });
    debug!("Streaming response started");

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
