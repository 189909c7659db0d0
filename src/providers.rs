//! Traits and type definitions for language model providers.
//!
//! The interface for all providers is the [`LanguageModel`] trait. A provider is
//! constructed for a single model identifier and answers batches of prompts
//! through [`LanguageModel::infer`], which produces a [`ScoredOutputStream`].
//!
//! ## Result Streams
//!
//! A stream yields exactly one group of [`ScoredOutput`]s per prompt, in the
//! order the prompts were given. Streams are lazy and single-pass: nothing is
//! sent to the gateway until [`ScoredOutputStream::next`] is awaited, and each
//! call to `next` sends at most one prompt. Once a stream has returned an
//! error it is exhausted, so the rest of the batch is never dispatched.
//!
//! ## Error Handling
//!
//! Gateways fail in many ways. Each failure is reported as an [`Error`] whose
//! [`ErrorKind`] says which category it belongs to. The underlying error is
//! kept as the source, and the model identifier and prompt index are attached
//! when the failure happened while serving a batch.

mod apireq;

pub mod litellm;
pub mod options;
pub mod providers;

use async_trait::async_trait;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;

pub use self::options::InferenceOptions;
use self::providers::ProviderIdentifier;

/// General categories of errors that can be returned by a [`LanguageModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The provider was configured with a missing or malformed value, such
    /// as an invalid API base or an unreadable credential.
    Configuration,
    /// The identifier matched this provider but the gateway does not serve
    /// the requested model.
    UnsupportedModel,
    /// The gateway could not be reached, or the transfer failed or timed out.
    Network,
    /// The credential was rejected or lacks the needed permissions.
    Authentication,
    /// A rate limit was reached or a quota was exceeded.
    RateLimit,
    /// Any other failure reported by the gateway.
    Delegate,
}

/// Where in a batch an error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub model_id: String,
    pub prompt_index: Option<usize>,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Option<ErrorContext>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Error {
        Error {
            kind,
            context: None,
            source: None,
        }
    }

    pub fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            context: None,
            source: Some(source),
        }
    }

    /// Attach the model and prompt position to the error. Existing context is
    /// replaced.
    pub fn with_context(mut self, model_id: &str, prompt_index: Option<usize>) -> Error {
        self.context = Some(ErrorContext {
            model_id: model_id.to_string(),
            prompt_index,
        });

        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Configuration => "the provider configuration is missing or invalid",
            ErrorKind::UnsupportedModel => "the model is not supported by the gateway",
            ErrorKind::Network => "failed to communicate with the gateway",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::RateLimit => "rate limit exceeded or quota crossed",
            ErrorKind::Delegate => "the gateway reported an error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())?;

        if let Some(ctx) = &self.context {
            match ctx.prompt_index {
                Some(i) => write!(f, " (model \"{}\", prompt {})", ctx.model_id, i)?,
                None => write!(f, " (model \"{}\")", ctx.model_id)?,
            }
        }

        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// One candidate response to one prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredOutput {
    /// Confidence in the output. Gateways that do not report one use 1.0.
    pub score: f64,
    /// The generated text.
    pub output: String,
}

impl ScoredOutput {
    pub fn new(score: f64, output: String) -> ScoredOutput {
        ScoredOutput { score, output }
    }
}

/// The lazily produced results of a batch.
#[async_trait]
pub trait ScoredOutputStream: Send {
    /// The result group for the next prompt, or `None` when the batch is
    /// finished or a previous call failed.
    async fn next(&mut self) -> Option<Result<Vec<ScoredOutput>, Error>>;

    /// The number of prompts which have not been answered yet.
    fn remaining(&self) -> usize;
}

/// A trait implemented by all providers.
pub trait LanguageModel: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderIdentifier;

    /// Returns the model identifier this provider was constructed for.
    fn model_id(&self) -> &str;

    /// Answers a batch of prompts.
    ///
    /// `batch_prompts`: the prompts, answered in order.
    /// `options`: per-call parameters, forwarded to the gateway as given.
    fn infer(
        &self,
        batch_prompts: Vec<String>,
        options: InferenceOptions,
    ) -> Box<dyn ScoredOutputStream>;
}

/// Drains a stream, stopping at the first error.
pub async fn collect_stream(
    mut stream: Box<dyn ScoredOutputStream>,
) -> Result<Vec<Vec<ScoredOutput>>, Error> {
    let mut groups = Vec::with_capacity(stream.remaining());

    while let Some(group) = stream.next().await {
        groups.push(group?);
    }

    Ok(groups)
}
