//! Provider credentials and generation parameters.
//!
//! The credentials file is a JSON object keyed by provider name:
//!
//! ```json
//! {
//!   "default_provider": "groq",
//!   "groq":   { "api_key": "gsk-...", "model": "llama3-70b-8192", "rate_limit_rpm": 30 },
//!   "gemini": { "api_key": "" }
//! }
//! ```
//!
//! Entries with an empty `api_key` are treated as disabled. Unknown keys are
//! ignored with a warning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};
use crate::llm::{GenerationRequest, Provider};

/// Explicit per-provider generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier
    pub model: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: GenerationRequest::DEFAULT_TEMPERATURE,
            max_output_tokens: GenerationRequest::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Reject empty models and out-of-range sampling parameters.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(Error::config("max_output_tokens must be positive"));
        }
        Ok(())
    }
}

/// Settings for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Model override
    #[serde(default)]
    pub model: Option<String>,
    /// Requests per minute (provider default when unset)
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Default sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Default output budget
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_rate_limit(mut self, rpm: u32) -> Self {
        self.rate_limit_rpm = Some(rpm);
        self
    }

    /// Resolved generation parameters for `provider`.
    pub fn generation_config(&self, provider: Provider) -> GenerationConfig {
        let mut config =
            GenerationConfig::new(self.model.as_deref().unwrap_or(provider.default_model()));
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(m) = self.max_output_tokens {
            config.max_output_tokens = m;
        }
        config
    }
}

/// Credentials and settings for every enabled provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    /// Enabled providers
    pub providers: BTreeMap<Provider, ProviderSettings>,
    /// Provider used when none is named
    pub default_provider: Option<Provider>,
}

impl ProvidersConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Provider, settings: ProviderSettings) -> Self {
        self.providers.insert(provider, settings);
        self
    }

    pub fn with_default_provider(mut self, provider: Provider) -> Self {
        self.default_provider = Some(provider);
        self
    }

    /// Load from a JSON credentials file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Parse the JSON credentials format.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut config = Self::new();

        for (key, value) in raw {
            if key == "default_provider" {
                let name = value
                    .as_str()
                    .ok_or_else(|| Error::config("default_provider must be a string"))?;
                config.default_provider = Some(name.parse()?);
                continue;
            }

            let Ok(provider) = key.parse::<Provider>() else {
                warn!(key = %key, "Ignoring unknown provider in configuration");
                continue;
            };
            let settings: ProviderSettings = serde_json::from_value(value)?;
            if settings.api_key.trim().is_empty() {
                continue;
            }
            config.providers.insert(provider, settings);
        }

        Ok(config)
    }

    /// Read API keys from each provider's environment variable, e.g. `GROQ_API_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        for provider in Provider::ALL {
            if let Ok(key) = std::env::var(provider.api_key_env()) {
                if !key.trim().is_empty() {
                    config.providers.insert(provider, ProviderSettings::new(key));
                }
            }
        }
        config
    }

    /// Fail unless at least one provider is usable and all settings are in range.
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::config(
                "No LLM providers configured; add API keys to the configuration",
            ));
        }
        if let Some(default) = self.default_provider {
            if !self.providers.contains_key(&default) {
                return Err(Error::config(format!(
                    "default_provider '{}' has no settings",
                    default
                )));
            }
        }
        for (provider, settings) in &self.providers {
            if settings.api_key.trim().is_empty() {
                return Err(Error::config(format!("{}: api_key is empty", provider)));
            }
            if settings.rate_limit_rpm == Some(0) {
                return Err(Error::config(format!(
                    "{}: rate_limit_rpm must be positive",
                    provider
                )));
            }
            settings
                .generation_config(*provider)
                .validate()
                .map_err(|e| Error::config(format!("{}: {}", provider, e)))?;
        }
        Ok(())
    }
}
