//! Concrete types for providers, along with their identifiers

use strum_macros;

/// The `ProviderIdentifier` is a unique per-provider identifier. It names
/// registry entries and is shown in listings.
///
/// The `to_string` and `FromStr` are part of the CLI and should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    serde::Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderIdentifier {
    LiteLLM,
}

pub use super::litellm::LiteLLMProvider;
