//! The calls the LiteLLM provider delegates to.
//!
//! [`HttpGateway`] talks to a LiteLLM proxy (or any other OpenAI-compatible
//! endpoint). [`EchoGateway`] answers without a network round trip and is used
//! for dry runs.

use async_trait::async_trait;
use reqwest::IntoUrl;
use serde::{Deserialize, Serialize};

use super::api;
use crate::providers::{Error, InferenceOptions, ScoredOutput};

/// One prompt, ready to be sent.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'r> {
    /// The model name as the gateway knows it.
    pub model: &'r str,
    pub prompt: &'r str,
    pub credential: Option<&'r str>,
    pub options: &'r InferenceOptions,
}

/// A delegate which turns one prompt into its candidate outputs.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ScoredOutput>, Error>;
}

/// Which [`Gateway`] a provider is built with.
#[derive(
    Deserialize,
    Serialize,
    Default,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Http,
    Echo,
}

pub struct HttpGateway {
    api: api::LiteLLMApi,
}

impl HttpGateway {
    pub fn new<U: IntoUrl>(api_base: U) -> Result<HttpGateway, Error> {
        Ok(HttpGateway {
            api: api::LiteLLMApi::new(api_base)?,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ScoredOutput>, Error> {
        let mut completion = self
            .api
            .chat_completion(
                request.model,
                request.prompt,
                request.credential,
                request.options,
            )
            .await?;

        if let Some(usage) = &completion.usage {
            tracing::debug!(
                id = %completion.id,
                model = completion.model.as_deref().unwrap_or(request.model),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion received"
            );
        }

        if completion.choices.is_empty() {
            return Err(api::Error::EmptyResponse.into());
        }

        completion.choices.sort_by_key(|c| c.index);

        let outputs = completion
            .choices
            .into_iter()
            .map(|choice| {
                if let Some(reason) = &choice.finish_reason {
                    tracing::trace!(index = choice.index, reason = %reason, "choice finished");
                }

                let score = choice.score();

                ScoredOutput::new(score, choice.message.content.unwrap_or_default())
            })
            .collect();

        Ok(outputs)
    }
}

/// The number of prompt characters repeated by [`EchoGateway`].
const ECHO_PREFIX_CHARS: usize = 50;

/// Answers every prompt with a fixed-score echo of its beginning.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoGateway;

#[async_trait]
impl Gateway for EchoGateway {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Vec<ScoredOutput>, Error> {
        let head: String = request.prompt.chars().take(ECHO_PREFIX_CHARS).collect();

        Ok(vec![ScoredOutput::new(
            1.0,
            format!("Mock response for: {}...", head),
        )])
    }
}
