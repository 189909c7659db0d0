//! An umbrella module for the LiteLLM provider

mod api;
pub mod credentials;
pub mod gateway;
mod provider;

pub use self::gateway::{CompletionRequest, EchoGateway, Gateway, GatewayKind, HttpGateway};
pub use self::provider::{gateway_model, LiteLLMProvider, ProviderConfig};

use crate::providers::{Error, LanguageModel};

/// Identifiers routed to this provider.
pub const LITELLM_PATTERN: &str = r"^litellm";

/// Registry factory for [`LiteLLMProvider`].
pub fn create(model_id: &str, config: ProviderConfig) -> Result<Box<dyn LanguageModel>, Error> {
    Ok(Box::new(LiteLLMProvider::new(model_id, config)?))
}
