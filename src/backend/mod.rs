pub mod gemini;
pub mod ollama;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};

use crate::config::BackendConfig;
use crate::errors::AppError;

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

/// Lazy, finite, non-restartable sequence of generated text fragments.
///
/// An `Err` item means the upstream failed after streaming had started; it is
/// always the last item.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

/// A model backend the relay can forward a single user turn to.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Opens a streaming generation for `message`.
    ///
    /// Returns `Err` when the upstream could not be reached or refused the
    /// request, before any fragment has been produced.
    async fn open_stream(&self, message: &str) -> Result<FragmentStream, AppError>;
}

/// Builds the backend selected by configuration.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>, AppError> {
    match config {
        BackendConfig::Ollama { base_url, model } => Ok(Arc::new(OllamaBackend::new(base_url, model))),
        BackendConfig::Gemini { api_key, model } => Ok(Arc::new(GeminiBackend::new(api_key, model)?)),
    }
}

/// Waits for the first item of `fragments` so that failures which only surface
/// on the first poll are reported as an open error instead of a broken body.
pub(crate) async fn prime(mut fragments: FragmentStream) -> Result<FragmentStream, AppError> {
    match fragments.next().await {
        None => Ok(Box::pin(stream::empty())),
        Some(Err(err)) => Err(err),
        Some(Ok(first)) => Ok(Box::pin(stream::once(async move { Ok(first) }).chain(fragments))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(items: Vec<Result<&'static str, AppError>>) -> FragmentStream {
        Box::pin(stream::iter(items.into_iter().map(|item| item.map(str::to_string))))
    }

    #[tokio::test]
    async fn prime_keeps_every_fragment_in_order() {
        let primed = prime(scripted(vec![Ok("a"), Ok("b"), Ok("c")])).await.unwrap();
        let fragments: Vec<String> = primed.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn prime_surfaces_a_leading_error() {
        let result = prime(scripted(vec![Err(AppError::UpstreamStatus { status: 401 }), Ok("never")])).await;
        assert!(matches!(result, Err(AppError::UpstreamStatus { status: 401 })));
    }

    #[tokio::test]
    async fn prime_accepts_an_empty_stream() {
        let primed = prime(scripted(vec![])).await.unwrap();
        assert_eq!(primed.count().await, 0);
    }

    #[test]
    fn from_config_selects_ollama() {
        let backend = from_config(&BackendConfig::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
        })
        .unwrap();
        assert_eq!(backend.name(), "ollama");
    }
}
