use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Body returned for every upstream failure that happens before streaming starts.
pub const UPSTREAM_ERROR_BODY: &str = "Model backend error";

/// Top-level application error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Model backend errors ─────────────────────────────────────────────────
    #[error("Model backend unavailable at {host}: {message}")]
    UpstreamUnavailable { host: String, message: String },

    #[error("Model backend responded with status {status}")]
    UpstreamStatus { status: u16 },

    #[error("Inference error: {message}")]
    Inference { message: String },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    // ── Startup errors ───────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    pub fn inference(message: impl Into<String>) -> Self {
        AppError::Inference { message: message.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. } | AppError::FieldTooLong { .. })
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamUnavailable { .. }
                | AppError::UpstreamStatus { .. }
                | AppError::Inference { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_validation() {
            return (StatusCode::BAD_REQUEST, self.to_string()).into_response();
        }
        // Upstream details stay in the logs; the caller only gets the fixed body.
        (StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_ERROR_BODY).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = AppError::EmptyField { field_name: "message".to_string() };
        assert!(err.is_validation());
        assert!(!err.is_upstream());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_map_to_fixed_500() {
        for err in [
            AppError::UpstreamStatus { status: 404 },
            AppError::UpstreamUnavailable {
                host: "http://localhost:11434".to_string(),
                message: "connection refused".to_string(),
            },
            AppError::inference("boom"),
        ] {
            assert!(err.is_upstream());
            assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn config_errors_are_neither_validation_nor_upstream() {
        let err = AppError::Config("CHAT_BACKEND".to_string());
        assert!(!err.is_validation());
        assert!(!err.is_upstream());
        assert_eq!(err.to_string(), "Invalid configuration: CHAT_BACKEND");
    }
}
