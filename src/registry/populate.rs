use super::registry::{Error, Registry};
use crate::config::Config;
use crate::providers::litellm::{self, ProviderConfig, LITELLM_PATTERN};
use crate::providers::providers::ProviderIdentifier;
use crate::providers::LanguageModel;

/// Builds the registry of built-in providers. The LiteLLM provider always
/// serves `^litellm`; patterns listed in the config are routed to it as well,
/// at the same priority.
pub fn populated_registry(config: &Config) -> Result<Registry, Error> {
    let mut registry = Registry::new();

    let litellm = &config.litellm;

    registry.register(
        LITELLM_PATTERN,
        litellm.priority,
        ProviderIdentifier::LiteLLM,
        litellm::create,
    )?;

    for pattern in &litellm.patterns {
        registry.register(
            pattern,
            litellm.priority,
            ProviderIdentifier::LiteLLM,
            litellm::create,
        )?;
    }

    Ok(registry)
}

/// Constructs the provider for `model_id`, falling back to `default_model`.
pub fn resolve_once(
    registry: &Registry,
    model_id: Option<&str>,
    default_model: Option<&str>,
    provider_config: ProviderConfig,
) -> Result<Box<dyn LanguageModel>, Error> {
    let model_id = model_id.or(default_model).ok_or(Error::DefaultModelUnset)?;

    registry.create(model_id, provider_config)
}
