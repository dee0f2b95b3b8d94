//! Resolved runtime configuration.
//!
//! Built once at startup from the config file cascade and the environment,
//! then passed by reference to whatever needs it. Missing required settings
//! are reported here, before any request is served.

use std::time::Duration;

use crate::config_file::ConfigFile;
use crate::document::{DEFAULT_MAX_DOCUMENT_BYTES, IntakePolicy};
use crate::error::ConfigError;

pub const ENV_MODEL: &str = "GOOGLE_GENERATIVE_AI_MODEL";
pub const ENV_API_KEY: &str = "GOOGLE_GENERATIVE_AI_API_KEY";
pub const ENV_BASE_URL: &str = "GOOGLE_GENERATIVE_AI_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "MINDMAP_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct Config {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    /// Upper bound on one whole extraction, first byte to last.
    pub timeout: Duration,
    pub max_document_bytes: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_document_bytes", &self.max_document_bytes)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Resolve configuration: env vars > config file > defaults.
    ///
    /// `env` looks up an environment variable; tests pass a closure over a map.
    pub fn resolve(
        file: &ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let provider = file.provider.clone().unwrap_or_default();
        let server = file.server.clone().unwrap_or_default();

        let api_key =
            non_empty(env(ENV_API_KEY).or(provider.api_key)).ok_or(ConfigError::MissingApiKey)?;
        let model =
            non_empty(env(ENV_MODEL).or(provider.model)).ok_or(ConfigError::MissingModel)?;
        let base_url = non_empty(env(ENV_BASE_URL).or(provider.base_url))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = match non_empty(env(ENV_TIMEOUT_SECS)) {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS.to_string(),
                reason: e.to_string(),
            })?,
            None => provider.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let max_document_bytes = match server.max_upload_mb {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "max_upload_mb".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            Some(mb) => mb as usize * 1024 * 1024,
            None => DEFAULT_MAX_DOCUMENT_BYTES,
        };

        Ok(Self {
            model,
            api_key,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            max_document_bytes,
        })
    }

    /// Resolve from the process environment and the config file cascade.
    pub fn from_env(file: &ConfigFile) -> Result<Self, ConfigError> {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    pub fn intake_policy(&self) -> IntakePolicy {
        IntakePolicy {
            max_bytes: self.max_document_bytes,
        }
    }
}
