use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use toml;

use crate::providers::litellm::{GatewayKind, ProviderConfig};
use crate::providers::InferenceOptions;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config \"{}\": {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(
        #[from]
        #[source]
        toml::de::Error,
    ),
    #[error("failed to reserialize config: {0}")]
    Reserialize(
        #[from]
        #[source]
        toml::ser::Error,
    ),
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub struct LiteLLM {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub priority: Option<u8>,
    /// Additional identifier patterns routed to the provider
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub gateway: GatewayKind,
    pub default_model: Option<String>,
    #[serde(default)]
    pub options: InferenceOptions,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub struct Config {
    #[serde(default)]
    pub litellm: LiteLLM,
}

impl Config {
    /// Construction parameters for the LiteLLM provider. The section's
    /// `api_base` fills in `options.api_base` when the latter is unset.
    pub fn provider_config(&self) -> ProviderConfig {
        let litellm = &self.litellm;

        let mut options = litellm.options.clone();

        if options.api_base.is_none() {
            options.api_base = litellm.api_base.clone();
        }

        ProviderConfig {
            api_key: litellm.api_key.clone(),
            options,
            gateway: litellm.gateway,
        }
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/lx-litellm/config.toml", ".lx-litellm.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/lx-litellm.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn extraneous_keys_helper<'a>(
    path: &mut Vec<&'a String>,
    found: &mut Vec<String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match config.get(user_key) {
            Some(config_value) => {
                if let (toml::Value::Table(user_value), toml::Value::Table(config_value)) =
                    (user_value, config_value)
                {
                    extraneous_keys_helper(path, found, user_value, config_value);
                }
            }
            None => {
                let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

                found.push(path.join("."));
            }
        }

        path.pop();
    }
}

/// Dotted paths of keys in `raw_config` which `config` does not use.
fn extraneous_keys(config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = toml::from_str(raw_config)?;

    let config: toml::Table = toml::from_str(&toml::to_string(config)?)?;

    let mut path = Vec::new();
    let mut found = Vec::new();

    extraneous_keys_helper(&mut path, &mut found, &user_config, &config);

    Ok(found)
}

/// Parses a configuration file. Unknown keys are reported as warnings.
pub fn parse_config(raw_config: &str) -> Result<Config, Error> {
    let config: Config = toml::from_str(raw_config)?;

    for key in extraneous_keys(&config, raw_config)? {
        tracing::warn!("config contains extraneous key \"{}\", ignoring", key);
    }

    Ok(config)
}

/// Reads the configuration from `config`, or from the first of the standard
/// locations which exists. With no file, the defaults are used.
pub fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    let config_path = config.or_else(get_config_path);

    match config_path {
        Some(path) => {
            let raw_config =
                std::fs::read_to_string(&path).map_err(|e| Error::Read(path.clone(), e))?;

            tracing::debug!(path = %path.display(), "read config");

            parse_config(&raw_config)
        }
        None => Ok(Config::default()),
    }
}
