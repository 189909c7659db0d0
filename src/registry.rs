//! The registry maps model identifiers to providers.
//!
//! Each entry pairs a regular expression over model identifiers with a
//! provider factory and a "priority", an eight bit unsigned number where 0 is
//! the lowest priority (a provider of last resort) and 255 the highest. An
//! identifier resolves to the highest-priority entry whose pattern matches it.
//! When entries of equal priority both match, the one registered first wins.
//!
//! Registration is explicit: [`populate::populated_registry`] registers the
//! built-in providers when the process starts.

mod default_priority;
pub mod populate;
pub mod registry;

pub use default_priority::default_priority;
pub use registry::{Error, ProviderEntry, ProviderFactory, Registry};
