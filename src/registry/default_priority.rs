use crate::providers::providers::ProviderIdentifier;

pub fn default_priority(provider_id: ProviderIdentifier) -> u8 {
    match provider_id {
        ProviderIdentifier::LiteLLM => 10,
    }
}
