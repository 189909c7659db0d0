//! A LiteLLM gateway provider for text-extraction hosts.
//!
//! The host builds a [`registry::Registry`] (usually through
//! [`registry::populate::populated_registry`]), resolves a model identifier
//! such as `litellm-gpt-4o-mini` to a provider, and feeds it batches of
//! prompts through [`providers::LanguageModel::infer`].

pub mod config;
pub mod providers;
pub mod registry;
