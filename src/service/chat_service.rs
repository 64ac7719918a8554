use std::sync::Arc;

use tracing::info;

use crate::backend::{FragmentStream, ModelBackend};
use crate::errors::AppError;
use crate::models::ChatRequest;

const MAX_MESSAGE_LENGTH: usize = 8000;

/// Stateless per-request entry point shared by the HTTP handlers.
#[derive(Clone)]
pub struct ChatService {
    backend: Arc<dyn ModelBackend>,
}

impl ChatService {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Validates `request` and opens a fragment stream for its message as the
    /// sole user turn.
    pub async fn stream_reply(&self, request: ChatRequest) -> Result<FragmentStream, AppError> {
        // ── Validation ────────────────────────────────────────────────────────
        if request.message.trim().is_empty() {
            return Err(AppError::EmptyField { field_name: "message".to_string() });
        }
        if request.message.len() > MAX_MESSAGE_LENGTH {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: MAX_MESSAGE_LENGTH,
                actual_length: request.message.len(),
            });
        }

        // ── Open the upstream stream ──────────────────────────────────────────
        info!(backend = self.backend.name(), chars = request.message.chars().count(), "Relaying chat message");
        self.backend.open_stream(&request.message).await
    }
}
