//! LLM client module for jobsmith
//!
//! This module provides a unified client for the supported LLM providers using a typestate pattern.
//! Each provider is enabled/disabled at build time of the client, ensuring type-safe API usage,
//! while [`Generator`] and [`Embedder`] give the workflow a provider-neutral view of it.

pub mod error;
pub mod gemini;
pub mod generation;
pub mod ollama;

use std::marker::PhantomData;

use async_trait::async_trait;

pub use error::LLMError;
pub use gemini::{Gemini, GeminiConfig, GeminiContent, GeminiGenerationConfig, GeminiResponse};
pub use generation::{ContextBlock, ContextKind, Embedder, GenerationRequest, Generator};
pub use ollama::{Ollama, OllamaConfig};

/// LLM client wrapper around reqwest::Client
/// Uses typestate pattern to track which providers are configured
#[derive(Clone)]
pub struct Client<S> {
    /// The underlying HTTP client
    pub(crate) client: reqwest::Client,
    /// Marker for the current state (which providers are enabled)
    pub(crate) state: PhantomData<S>,
    /// Ollama configuration
    pub(crate) ollama_config: Option<OllamaConfig>,
    /// Gemini configuration
    pub(crate) gemini_config: Option<GeminiConfig>,
}

// ============================================================================
// Type States
// ============================================================================

/// Marker indicating a provider is enabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enabled;

/// Marker indicating a provider is disabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disabled;

/// Provider state container
/// Each type parameter tracks whether a specific provider is configured
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Providers<OllamaState, GeminiState> {
    _ollama: PhantomData<OllamaState>,
    _gemini: PhantomData<GeminiState>,
}

/// Trait to check if a provider is available on this client
pub trait HasProvider<Provider> {}

/// Ollama is available when the first type param is Enabled
impl<G> HasProvider<Ollama> for Providers<Enabled, G> {}

/// Gemini is available when the second type param is Enabled
impl<O> HasProvider<Gemini> for Providers<O, Enabled> {}

// ============================================================================
// Client constructors and builders
// ============================================================================

impl Client<Providers<Disabled, Disabled>> {
    /// Create a new LLM client with no providers configured
    pub fn new() -> Self {
        Self::from_http(reqwest::Client::new())
    }

    /// Create a client on top of an existing HTTP client (timeouts, proxies, ...)
    pub fn from_http(client: reqwest::Client) -> Self {
        Client {
            client,
            state: PhantomData,
            ollama_config: None,
            gemini_config: None,
        }
    }
}

impl Default for Client<Providers<Disabled, Disabled>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> Client<Providers<Disabled, G>> {
    /// Enable Ollama provider with the default host (http://localhost:11434) and default model (phi4)
    pub fn with_ollama(self) -> Client<Providers<Enabled, G>> {
        self.with_ollama_at("http://localhost:11434")
    }

    /// Enable Ollama provider with a custom host URL
    pub fn with_ollama_at(self, host: impl Into<String>) -> Client<Providers<Enabled, G>> {
        Client {
            client: self.client,
            state: PhantomData,
            ollama_config: Some(OllamaConfig {
                host: host.into().trim_end_matches('/').to_string(),
                ..Default::default()
            }),
            gemini_config: self.gemini_config,
        }
    }
}

impl<O> Client<Providers<O, Disabled>> {
    /// Enable Gemini provider with API key and default base URL
    pub fn with_gemini(self, api_key: impl Into<String>) -> Client<Providers<O, Enabled>> {
        self.with_gemini_at(api_key, "https://generativelanguage.googleapis.com")
    }

    /// Enable Gemini provider with API key and custom base URL
    pub fn with_gemini_at(
        self,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Client<Providers<O, Enabled>> {
        Client {
            client: self.client,
            state: PhantomData,
            ollama_config: self.ollama_config,
            gemini_config: Some(GeminiConfig {
                api_key: api_key.into(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                ..Default::default()
            }),
        }
    }
}

// Edit methods for enabled providers

impl<G> Client<Providers<Enabled, G>> {
    /// Update the Ollama default model
    pub fn edit_ollama_default_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.ollama_config {
            config.default_model = model.into();
        }
    }

    /// Update the Ollama embedding model
    pub fn edit_ollama_embedding_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.ollama_config {
            config.embedding_model = model.into();
        }
    }
}

impl<O> Client<Providers<O, Enabled>> {
    /// Update the Gemini API key
    pub fn edit_gemini_api_key(&mut self, api_key: impl Into<String>) {
        if let Some(ref mut config) = self.gemini_config {
            config.api_key = api_key.into();
        }
    }

    /// Update the Gemini default model
    pub fn edit_gemini_default_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.gemini_config {
            config.default_model = model.into();
        }
    }

    /// Update the Gemini embedding model
    pub fn edit_gemini_embedding_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.gemini_config {
            config.embedding_model = model.into();
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Client<S> {
    /// Name of the model the client would use for generation, for logs and traces.
    pub fn active_model(&self) -> Option<&str> {
        if let Some(config) = &self.gemini_config {
            return Some(&config.default_model);
        }
        self.ollama_config.as_ref().map(|c| c.default_model.as_str())
    }

    /// Internal dispatch method to call the first available provider.
    /// Gemini wins when both are configured.
    pub(crate) async fn dispatch_generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, LLMError> {
        if self.gemini_config.is_some() {
            return self
                .gemini_generate(None, &request.system_prompt(), &request.user_prompt(), None)
                .await;
        }

        if self.ollama_config.is_some() {
            return self
                .ollama_generate(None, &request.system_prompt(), &request.user_prompt())
                .await;
        }

        Err(LLMError::ProviderNotConfigured("No LLM provider available".to_string()))
    }

    pub(crate) async fn dispatch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LLMError> {
        if self.gemini_config.is_some() {
            return self.gemini_embed(texts).await;
        }

        if self.ollama_config.is_some() {
            return self.ollama_embed(texts).await;
        }

        Err(LLMError::ProviderNotConfigured("No embedding provider available".to_string()))
    }
}

#[async_trait]
impl<S: Clone + Send + Sync + 'static> Generator for Client<S> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LLMError> {
        log::debug!(
            "Generating for role '{}' with {} context block(s)",
            request.role,
            request.context.len()
        );
        self.dispatch_generate(request).await
    }
}

#[async_trait]
impl<S: Clone + Send + Sync + 'static> Embedder for Client<S> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LLMError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.dispatch_embed(texts).await
    }
}

// ============================================================================
// Deref to reqwest::Client for direct HTTP usage
// ============================================================================

impl<S: Clone + Send + Sync + 'static> std::ops::Deref for Client<S> {
    type Target = reqwest::Client;
    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
