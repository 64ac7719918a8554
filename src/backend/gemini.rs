use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use rig::agent::MultiTurnStreamItem;
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use tracing::{debug, error};

use super::{prime, FragmentStream, ModelBackend};
use crate::errors::AppError;

const GEMINI_HOST: &str = "generativelanguage.googleapis.com";

/// Cloud Gemini model, streamed through the rig provider client.
///
/// The provider hands back already-decoded text fragments, which are forwarded
/// verbatim.
#[derive(Clone)]
pub struct GeminiBackend {
    client: gemini::Client,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        let client = gemini::Client::builder()
            .api_key(api_key)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build Gemini client: {e}")))?;
        Ok(Self { client, model: model.to_string() })
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn open_stream(&self, message: &str) -> Result<FragmentStream, AppError> {
        let agent = self.client.agent(&self.model).build();
        let prompt = message.to_string();

        // Only assistant text is relayed; tool calls, reasoning and the final
        // response marker come through as `None`.
        let upstream = async_stream::stream! {
            let mut items = agent.stream_prompt(prompt).await;
            while let Some(item) = items.next().await {
                yield item.map(|item| match item {
                    MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(text)) => Some(text.text),
                    _ => None,
                });
            }
        };

        // The provider reports connection and auth failures on the first poll.
        let fragments = prime(text_fragments(upstream)).await.map_err(|e| {
            error!(model = %self.model, "Gemini stream failed to start: {e}");
            open_error(e)
        })?;

        debug!(model = %self.model, "Gemini stream opened");
        Ok(fragments)
    }
}

/// Keeps the non-empty text items of a provider stream and stops at the first error.
fn text_fragments<S, E>(upstream: S) -> FragmentStream
where
    S: Stream<Item = Result<Option<String>, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures_util::pin_mut!(upstream);
        while let Some(item) = upstream.next().await {
            match item {
                Ok(Some(text)) if !text.is_empty() => yield Ok(text),
                Ok(_) => {}
                Err(e) => {
                    yield Err(AppError::inference(e.to_string()));
                    return;
                }
            }
        }
    })
}

/// A provider error before the first fragment means the model was never reached.
fn open_error(err: AppError) -> AppError {
    match err {
        AppError::Inference { message } => AppError::UpstreamUnavailable { host: GEMINI_HOST.to_string(), message },
        other => other,
    }
}
