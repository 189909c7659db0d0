//! Per-call and per-provider inference parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters forwarded to the gateway. Every field defaults to unset, and
/// unset fields are left out of the request so the gateway applies its own
/// defaults. Values are never validated or clamped here.
#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InferenceOptions {
    /// Overrides the gateway URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Number of candidates to generate per prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Gateway-specific fields, sent as top-level request fields. Always
    /// serialized, so an empty `[extra]` table survives a config round trip.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InferenceOptions {
    /// Returns `self` with every field set in `overrides` replaced. Entries
    /// of `extra` are merged key by key.
    pub fn merged(&self, overrides: &InferenceOptions) -> InferenceOptions {
        let mut extra = self.extra.clone();

        for (key, value) in &overrides.extra {
            extra.insert(key.clone(), value.clone());
        }

        InferenceOptions {
            api_base: overrides.api_base.clone().or_else(|| self.api_base.clone()),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            timeout: overrides.timeout.or(self.timeout),
            n: overrides.n.or(self.n),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
            seed: overrides.seed.or(self.seed),
            extra,
        }
    }

    /// The timeout as a duration. Values which cannot be represented (negative,
    /// NaN or infinite) are passed through as "no timeout" since the gateway
    /// owns validation.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
