//! Credential and API base resolution.
//!
//! Lookups go through a caller-supplied function so the resolution order can
//! be exercised without touching the process environment.

use lazy_static::lazy_static;
use regex::Regex;
use std::env::VarError;

use crate::providers::{Error, ErrorKind, InferenceOptions};

use super::api::DEFAULT_API_BASE;

pub const LITELLM_API_KEY_VAR: &str = "LITELLM_API_KEY";
pub const LITELLM_API_BASE_VAR: &str = "LITELLM_API_BASE";

lazy_static! {
    // Keys for upstream providers, matched against the gateway model name.
    // Both LiteLLM route prefixes ("anthropic/...") and bare model families
    // ("claude-...") are recognized.
    static ref PROVIDER_KEY_VARS: [(Regex, &'static str); 5] = [
        (Regex::new(r"^(openai/|gpt-|o1|o3|text-)").unwrap(), "OPENAI_API_KEY"),
        (Regex::new(r"^(anthropic/|claude)").unwrap(), "ANTHROPIC_API_KEY"),
        (Regex::new(r"^(gemini/|vertex_ai/|gemini|palm)").unwrap(), "GOOGLE_API_KEY"),
        (Regex::new(r"^(mistral/|mistral|codestral)").unwrap(), "MISTRAL_API_KEY"),
        (Regex::new(r"^(cohere/|command)").unwrap(), "COHERE_API_KEY"),
    ];
}

/// The provider-specific key variable for a gateway model, if there is one.
pub fn provider_key_var(model: &str) -> Option<&'static str> {
    PROVIDER_KEY_VARS
        .iter()
        .find(|(pattern, _)| pattern.is_match(model))
        .map(|(_, var)| *var)
}

/// Reads an environment variable. Unset and empty variables are both treated
/// as absent.
pub fn env_var(name: &str) -> Result<Option<String>, Error> {
    env_value(std::env::var(name))
}

fn env_value(value: Result<String, VarError>) -> Result<Option<String>, Error> {
    match value {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err @ VarError::NotUnicode(_)) => {
            Err(Error::from_source(ErrorKind::Configuration, Box::new(err)))
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("the explicitly provided API key is empty")]
struct EmptyApiKey;

/// Resolves the credential for `model`: the explicit key, then
/// `LITELLM_API_KEY`, then the upstream provider's own variable.
///
/// Finding nothing is not an error. The gateway may not need a key, and if
/// it does, the first request fails with an authentication error.
pub fn resolve_credential<F>(
    explicit: Option<&str>,
    model: &str,
    lookup: F,
) -> Result<Option<String>, Error>
where
    F: Fn(&str) -> Result<Option<String>, Error>,
{
    if let Some(key) = explicit {
        if key.is_empty() {
            return Err(Error::from_source(
                ErrorKind::Configuration,
                Box::new(EmptyApiKey),
            ));
        }

        return Ok(Some(key.to_string()));
    }

    if let Some(key) = lookup(LITELLM_API_KEY_VAR)? {
        return Ok(Some(key));
    }

    match provider_key_var(model) {
        Some(var) => lookup(var),
        None => Ok(None),
    }
}

/// Resolves the gateway URL: the `api_base` option, then `LITELLM_API_BASE`,
/// then the LiteLLM proxy default.
pub fn resolve_api_base<F>(options: &InferenceOptions, lookup: F) -> Result<String, Error>
where
    F: Fn(&str) -> Result<Option<String>, Error>,
{
    if let Some(api_base) = &options.api_base {
        return Ok(api_base.clone());
    }

    Ok(lookup(LITELLM_API_BASE_VAR)?.unwrap_or_else(|| DEFAULT_API_BASE.to_string()))
}
