//! Text-generation types: providers, requests and responses.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Text-generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[serde(rename = "openai")]
    OpenAI,
}

impl Provider {
    /// All known providers, in registry order.
    pub const ALL: [Provider; 4] = [
        Provider::Gemini,
        Provider::Groq,
        Provider::HuggingFace,
        Provider::OpenAI,
    ];

    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-flash",
            Self::Groq => "llama3-70b-8192",
            Self::HuggingFace => "google/flan-t5-large",
            Self::OpenAI => "gpt-3.5-turbo",
        }
    }

    /// Requests per minute allowed on the provider's free tier.
    pub fn default_rate_limit_rpm(&self) -> u32 {
        match self {
            Self::Gemini => 15,
            Self::Groq => 30,
            Self::HuggingFace => 10,
            Self::OpenAI => 3,
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::HuggingFace => "HUGGINGFACE_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Groq => write!(f, "groq"),
            Self::HuggingFace => write!(f, "huggingface"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            "huggingface" => Ok(Self::HuggingFace),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::config(format!("Unknown provider: {}", other))),
        }
    }
}

/// A single-prompt generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Prompt text, sent as one user turn
    pub prompt: String,
    /// Sampling temperature (0.0 - 2.0); the client's default when unset
    pub temperature: Option<f64>,
    /// Maximum tokens to generate; the client's default when unset
    pub max_tokens: Option<u32>,
    /// Model override; the client's default model is used when unset
    pub model: Option<String>,
}

impl GenerationRequest {
    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    /// Default output budget.
    pub const DEFAULT_MAX_TOKENS: u32 = 512;

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
            model: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Same parameters, different prompt.
    pub fn for_prompt(&self, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..self.clone()
        }
    }
}

/// Generated text with usage and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub text: String,
    /// Model that produced the text
    pub model: String,
    /// Provider that served the request
    pub provider: Provider,
    /// Total tokens billed (prompt + completion); 0 when not reported
    pub tokens_used: u64,
    /// Wall-clock latency of the call
    pub latency_ms: u64,
}
