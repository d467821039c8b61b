//! Text-generation capability and provider plumbing.
//!
//! Detectors only depend on the [`TextGenerator`] trait. Concrete clients
//! (OpenAI-compatible chat completions for OpenAI and Groq, Gemini behind
//! the `gemini` feature, HuggingFace Inference behind `huggingface`) are
//! built once, wrapped in a [`RateLimitedClient`], and collected in a
//! [`ProviderRegistry`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use hallucination_core::config::ProvidersConfig;
//! use hallucination_core::llm::{GenerationRequest, ProviderRegistry, TextGenerator};
//!
//! let config = ProvidersConfig::load("configs/api_keys.json")?;
//! let registry = ProviderRegistry::from_config(&config)?;
//!
//! let generation = registry
//!     .generate(GenerationRequest::new("What is the capital of France?").with_max_tokens(50))
//!     .await?;
//! println!("{} ({} tokens)", generation.text, generation.tokens_used);
//! ```

mod batch;
mod client;
mod rate_limit;
mod types;

pub use batch::{BatchExecutor, BatchItem, BatchResults, DEFAULT_MAX_PARALLEL};
#[cfg(feature = "gemini")]
pub use client::GeminiClient;
#[cfg(feature = "huggingface")]
pub use client::HuggingFaceClient;
pub use client::{ClientConfig, OpenAICompatibleClient, ProviderRegistry, TextGenerator};
pub use rate_limit::{RateLimitedClient, RateLimiter};
pub use types::{Generation, GenerationRequest, Provider};
