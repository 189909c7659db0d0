use super::default_priority::default_priority;

use crate::providers::{self, providers::ProviderIdentifier, LanguageModel};
use crate::providers::litellm::ProviderConfig;
use regex::Regex;
use thiserror::Error;

/// Builds a provider for a model identifier.
pub type ProviderFactory =
    fn(&str, ProviderConfig) -> Result<Box<dyn LanguageModel>, providers::Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The pattern could not be compiled
    #[error("pattern \"{0}\" is not a valid regular expression")]
    InvalidPattern(String, #[source] regex::Error),
    /// The same pattern is already registered at this priority
    #[error("pattern \"{0}\" is already registered at priority {1}")]
    DuplicatePattern(String, u8),
    /// No pattern matches the model identifier
    #[error("model \"{0}\" is not served by any of the registered providers")]
    ModelNotMatched(String),
    /// No model identifier was given and none is configured
    #[error("no model was specified and no default model is configured")]
    DefaultModelUnset,
    /// The factory of the matching provider failed
    #[error("failed to construct provider \"{0}\" for model \"{1}\"")]
    ConstructionFailed(ProviderIdentifier, String, #[source] providers::Error),
}

pub struct ProviderEntry {
    pattern: Regex,
    priority: u8,
    provider: ProviderIdentifier,
    factory: ProviderFactory,
}

impl ProviderEntry {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn provider(&self) -> ProviderIdentifier {
        self.provider
    }

    pub fn matches(&self, model_id: &str) -> bool {
        self.pattern.is_match(model_id)
    }
}

/// Entries are kept in resolution order: by descending priority, then by
/// registration order.
#[derive(Default)]
pub struct Registry {
    entries: Vec<ProviderEntry>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            entries: Vec::new(),
        }
    }

    /// Registers `factory` for identifiers matching `pattern`. Without an
    /// explicit priority the provider's default priority is used.
    pub fn register(
        &mut self,
        pattern: &str,
        priority: Option<u8>,
        provider: ProviderIdentifier,
        factory: ProviderFactory,
    ) -> Result<(), Error> {
        let priority = priority.unwrap_or(default_priority(provider));

        if self
            .entries
            .iter()
            .any(|e| e.priority == priority && e.pattern() == pattern)
        {
            return Err(Error::DuplicatePattern(pattern.to_string(), priority));
        }

        let regex =
            Regex::new(pattern).map_err(|e| Error::InvalidPattern(pattern.to_string(), e))?;

        tracing::info!(pattern, priority, provider = %provider, "registered provider");

        self.entries.push(ProviderEntry {
            pattern: regex,
            priority,
            provider,
            factory,
        });

        // Stable, so earlier registrations stay ahead on ties
        self.entries.sort_by(|a, b| b.priority.cmp(&a.priority));

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in resolution order.
    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    /// Finds the entry serving `model_id`.
    pub fn resolve(&self, model_id: &str) -> Result<&ProviderEntry, Error> {
        self.entries
            .iter()
            .find(|e| e.matches(model_id))
            .ok_or_else(|| Error::ModelNotMatched(model_id.to_string()))
    }

    /// Resolves `model_id` and constructs its provider.
    pub fn create(
        &self,
        model_id: &str,
        config: ProviderConfig,
    ) -> Result<Box<dyn LanguageModel>, Error> {
        let entry = self.resolve(model_id)?;

        tracing::debug!(model_id, pattern = entry.pattern(), "resolved provider");

        (entry.factory)(model_id, config)
            .map_err(|e| Error::ConstructionFailed(entry.provider, model_id.to_string(), e))
    }
}
