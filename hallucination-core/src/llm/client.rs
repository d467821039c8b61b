//! Text-generation trait and provider implementations.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{GenerationConfig, ProvidersConfig};
use crate::error::{Error, Result};

use super::rate_limit::RateLimitedClient;
use super::types::{Generation, GenerationRequest, Provider};

/// Capability to generate text from a prompt.
///
/// Detectors receive this as an injected `Arc<dyn TextGenerator>`; tests
/// substitute a fake.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a single prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation>;

    /// Provider serving this generator.
    fn provider(&self) -> Provider;
}

/// Configuration for provider clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: Option<String>,
    /// Temperature for requests that do not set one
    pub default_temperature: Option<f64>,
    /// Output budget for requests that do not set one
    pub default_max_tokens: Option<u32>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: None,
            default_temperature: None,
            default_max_tokens: None,
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_default_temperature(mut self, temperature: f64) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = Some(max_tokens);
        self
    }

    /// Use `generation` as the defaults for model, temperature and output budget.
    pub fn with_generation_config(self, generation: &GenerationConfig) -> Self {
        self.with_default_model(&generation.model)
            .with_default_temperature(generation.temperature)
            .with_default_max_tokens(generation.max_output_tokens)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Temperature and output budget for `request`: the request's own values,
    /// then the client defaults, then [`GenerationRequest`]'s.
    pub(crate) fn sampling(&self, request: &GenerationRequest) -> (f64, u32) {
        let temperature = request
            .temperature
            .or(self.default_temperature)
            .unwrap_or(GenerationRequest::DEFAULT_TEMPERATURE);
        let max_tokens = request
            .max_tokens
            .or(self.default_max_tokens)
            .unwrap_or(GenerationRequest::DEFAULT_MAX_TOKENS);
        (temperature, max_tokens)
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Proxy auto-detection can panic in some sandboxed environments;
    // retry without proxy support in that case.
    match catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build())) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e))),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Client for OpenAI-compatible chat completion APIs (OpenAI, Groq).
pub struct OpenAICompatibleClient {
    provider: Provider,
    config: ClientConfig,
    http: Client,
}

impl OpenAICompatibleClient {
    const OPENAI_BASE_URL: &'static str = "https://api.openai.com";
    const GROQ_BASE_URL: &'static str = "https://api.groq.com/openai";

    /// Client for the OpenAI API.
    pub fn openai(config: ClientConfig) -> Result<Self> {
        Self::new(Provider::OpenAI, config)
    }

    /// Client for the Groq API.
    pub fn groq(config: ClientConfig) -> Result<Self> {
        Self::new(Provider::Groq, config)
    }

    fn new(provider: Provider, config: ClientConfig) -> Result<Self> {
        if !matches!(provider, Provider::OpenAI | Provider::Groq) {
            return Err(Error::config(format!(
                "{} does not speak the OpenAI chat completions protocol",
                provider
            )));
        }
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self {
            provider,
            config,
            http,
        })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(match self.provider {
            Provider::Groq => Self::GROQ_BASE_URL,
            _ => Self::OPENAI_BASE_URL,
        })
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl TextGenerator for OpenAICompatibleClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let start = Instant::now();
        let (temperature, max_tokens) = self.config.sampling(&request);
        let model = request
            .model
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| self.provider.default_model().to_string());

        let api_request = ChatRequest {
            model: model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(request.prompt),
            }],
            max_tokens,
            temperature,
        };

        let url = format!("{}/v1/chat/completions", self.base_url());
        debug!(provider = %self.provider, %model, "Sending chat completion request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                Error::llm_api(self.provider.to_string(), format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::llm_api(self.provider.to_string(), format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(Error::llm_api(self.provider.to_string(), error.error.message));
            }
            return Err(Error::llm_api(
                self.provider.to_string(),
                format!("({}): {}", status, body),
            ));
        }

        let api_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            Error::llm_api(self.provider.to_string(), format!("Failed to parse response: {}", e))
        })?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm_api(self.provider.to_string(), "No choices in response"))?;

        Ok(Generation {
            text,
            model: api_response.model,
            provider: self.provider,
            tokens_used: api_response.usage.map(|u| u.total_tokens).unwrap_or(0),
            latency_ms: elapsed_ms(start),
        })
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}

/// Google Gemini client.
#[cfg(feature = "gemini")]
pub struct GeminiClient {
    config: ClientConfig,
    http: Client,
}

#[cfg(feature = "gemini")]
impl GeminiClient {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

#[cfg(feature = "gemini")]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[cfg(feature = "gemini")]
#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[cfg(feature = "gemini")]
#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[cfg(feature = "gemini")]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[cfg(feature = "gemini")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[cfg(feature = "gemini")]
#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[cfg(feature = "gemini")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

#[cfg(feature = "gemini")]
#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let start = Instant::now();
        let (temperature, max_tokens) = self.config.sampling(&request);
        let model = request
            .model
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| Provider::Gemini.default_model().to_string());

        let api_request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: max_tokens,
                temperature,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url(),
            model,
            self.config.api_key
        );
        debug!(provider = "gemini", %model, "Sending generateContent request");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::llm_api("gemini", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::llm_api("gemini", format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(Error::llm_api("gemini", error.error.message));
            }
            return Err(Error::llm_api("gemini", format!("({}): {}", status, body)));
        }

        let api_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| Error::llm_api("gemini", format!("Failed to parse response: {}", e)))?;

        let candidate = api_response
            .candidates
            .first()
            .ok_or_else(|| Error::llm_api("gemini", "No candidates in response"))?;

        let text = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(Generation {
            text,
            model,
            provider: Provider::Gemini,
            tokens_used: api_response
                .usage_metadata
                .map(|u| u.total_token_count)
                .unwrap_or(0),
            latency_ms: elapsed_ms(start),
        })
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }
}

/// HuggingFace Inference API client.
///
/// Tokens are not reported by the API, so `tokens_used` is always 0.
#[cfg(feature = "huggingface")]
pub struct HuggingFaceClient {
    config: ClientConfig,
    http: Client,
}

#[cfg(feature = "huggingface")]
impl HuggingFaceClient {
    const DEFAULT_BASE_URL: &'static str = "https://api-inference.huggingface.co";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn post(&self, model: &str, api_request: &HfRequest<'_>) -> Result<String> {
        let url = format!("{}/models/{}", self.base_url(), model);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(api_request)
            .send()
            .await
            .map_err(|e| Error::llm_api("huggingface", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::llm_api("huggingface", format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<HfError>(&body) {
                return Err(Error::llm_api("huggingface", error.error));
            }
            return Err(Error::llm_api("huggingface", format!("({}): {}", status, body)));
        }

        let api_response: HfResponse = serde_json::from_str(&body).map_err(|e| {
            Error::llm_api("huggingface", format!("Failed to parse response: {}", e))
        })?;
        match api_response {
            HfResponse::Batch(items) => items
                .into_iter()
                .next()
                .map(|item| item.generated_text)
                .ok_or_else(|| Error::llm_api("huggingface", "Empty generation list")),
            HfResponse::Single(item) => Ok(item.generated_text),
        }
    }
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
    parameters: HfParameters,
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Serialize)]
struct HfParameters {
    max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_full_text: Option<bool>,
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Deserialize)]
struct HfGenerated {
    generated_text: String,
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfResponse {
    Batch(Vec<HfGenerated>),
    Single(HfGenerated),
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Deserialize)]
struct HfError {
    error: String,
}

#[cfg(feature = "huggingface")]
#[async_trait]
impl TextGenerator for HuggingFaceClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let start = Instant::now();
        let (temperature, max_tokens) = self.config.sampling(&request);
        let model = request
            .model
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| Provider::HuggingFace.default_model().to_string());

        let full = HfRequest {
            inputs: &request.prompt,
            parameters: HfParameters {
                max_new_tokens: max_tokens,
                temperature: Some(temperature),
                return_full_text: Some(false),
            },
        };
        debug!(provider = "huggingface", %model, "Sending text-generation request");

        // Some hosted models reject sampling parameters; retry with the output budget only.
        let text = match self.post(&model, &full).await {
            Ok(text) => text,
            Err(first) => {
                debug!(error = %first, "Retrying with minimal parameters");
                let minimal = HfRequest {
                    inputs: &request.prompt,
                    parameters: HfParameters {
                        max_new_tokens: max_tokens,
                        temperature: None,
                        return_full_text: None,
                    },
                };
                self.post(&model, &minimal).await?
            }
        };

        Ok(Generation {
            text,
            model,
            provider: Provider::HuggingFace,
            tokens_used: 0,
            latency_ms: elapsed_ms(start),
        })
    }

    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }
}

/// Registry of initialized providers, built once and shared by detectors.
///
/// Implements [`TextGenerator`] itself by routing to the default provider.
pub struct ProviderRegistry {
    clients: BTreeMap<Provider, Arc<dyn TextGenerator>>,
    default_provider: Option<Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            default_provider: None,
        }
    }

    /// Add a client. The first client added becomes the default.
    pub fn with_client(mut self, client: Arc<dyn TextGenerator>) -> Self {
        let provider = client.provider();
        self.clients.insert(provider, client);
        self.default_provider.get_or_insert(provider);
        self
    }

    /// Set the default provider.
    pub fn with_default_provider(mut self, provider: Provider) -> Self {
        self.default_provider = Some(provider);
        self
    }

    /// Build rate-limited clients for every configured provider.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        config.validate()?;
        let mut registry = Self::new();

        for (provider, settings) in &config.providers {
            let mut client_config = ClientConfig::new(&settings.api_key)
                .with_generation_config(&settings.generation_config(*provider));
            if let Some(url) = &settings.base_url {
                client_config = client_config.with_base_url(url);
            }
            if let Some(secs) = settings.timeout_secs {
                client_config = client_config.with_timeout(secs);
            }

            let client: Arc<dyn TextGenerator> = match provider {
                Provider::OpenAI => Arc::new(OpenAICompatibleClient::openai(client_config)?),
                Provider::Groq => Arc::new(OpenAICompatibleClient::groq(client_config)?),
                #[cfg(feature = "gemini")]
                Provider::Gemini => Arc::new(GeminiClient::new(client_config)?),
                #[cfg(not(feature = "gemini"))]
                Provider::Gemini => {
                    tracing::warn!(
                        "Gemini configured but the `gemini` feature is disabled; skipping"
                    );
                    continue;
                }
                #[cfg(feature = "huggingface")]
                Provider::HuggingFace => Arc::new(HuggingFaceClient::new(client_config)?),
                #[cfg(not(feature = "huggingface"))]
                Provider::HuggingFace => {
                    tracing::warn!(
                        "HuggingFace configured but the `huggingface` feature is disabled; skipping"
                    );
                    continue;
                }
            };

            let rpm = settings
                .rate_limit_rpm
                .unwrap_or_else(|| provider.default_rate_limit_rpm());
            registry = registry.with_client(Arc::new(RateLimitedClient::new(client, rpm)));
            info!(%provider, rpm, "Provider initialized");
        }

        if let Some(default) = config.default_provider {
            registry = registry.with_default_provider(default);
        }

        if registry.clients.is_empty() {
            return Err(Error::config("No LLM providers could be initialized"));
        }
        Ok(registry)
    }

    /// Get a client for a specific provider.
    pub fn get_client(&self, provider: Provider) -> Option<&Arc<dyn TextGenerator>> {
        self.clients.get(&provider)
    }

    /// Providers with an initialized client.
    pub fn available_providers(&self) -> Vec<Provider> {
        self.clients.keys().copied().collect()
    }

    /// The provider used by [`TextGenerator::generate`].
    pub fn default_provider(&self) -> Option<Provider> {
        self.default_provider
    }

    /// Generate using a specific provider.
    pub async fn generate_with(
        &self,
        provider: Provider,
        request: GenerationRequest,
    ) -> Result<Generation> {
        let client = self.clients.get(&provider).ok_or_else(|| {
            Error::config(format!(
                "Provider '{}' not initialized. Available: {:?}",
                provider,
                self.available_providers()
            ))
        })?;
        client.generate(request).await
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ProviderRegistry {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let provider = self
            .default_provider
            .ok_or_else(|| Error::config("No default provider configured"))?;
        self.generate_with(provider, request).await
    }

    fn provider(&self) -> Provider {
        // An empty registry has no meaningful provider; report the first known one.
        self.default_provider.unwrap_or(Provider::ALL[0])
    }
}
