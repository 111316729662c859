//! Ollama LLM client for local inference

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{Client, HasProvider, error::LLMError};

/// Marker type for Ollama provider
pub struct Ollama;

/// Configuration for Ollama client
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama server URL (default: http://localhost:11434)
    pub host: String,
    /// Default model to use (default: phi4)
    pub default_model: String,
    /// Model used for embeddings (default: nomic-embed-text)
    pub embedding_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            default_model: "phi4".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Request structure for Ollama chat completions
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// A message in Ollama's chat format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

impl OllamaMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Options for Ollama generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Response from Ollama's chat endpoint
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub message: OllamaMessage,
    pub done: bool,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub eval_count: u32,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl<S> Client<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn ollama(&self) -> Result<&OllamaConfig, LLMError> {
        self.ollama_config
            .as_ref()
            .ok_or_else(|| LLMError::ProviderNotConfigured("Ollama not configured".to_string()))
    }

    pub(crate) async fn send_ollama_chat(
        &self,
        model: Option<String>,
        messages: Vec<OllamaMessage>,
        options: Option<OllamaOptions>,
    ) -> Result<OllamaChatResponse, LLMError> {
        let config = self.ollama()?;

        let request = OllamaChatRequest {
            model: model.unwrap_or_else(|| config.default_model.clone()),
            messages,
            stream: false,
            options,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", config.host))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Status {
                provider: "Ollama",
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub(crate) async fn ollama_generate(
        &self,
        model: Option<String>,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LLMError> {
        let messages = vec![
            OllamaMessage::system(system_prompt),
            OllamaMessage::user(user_prompt),
        ];
        let response = self.send_ollama_chat(model, messages, None).await?;
        if response.message.content.trim().is_empty() {
            return Err(LLMError::InvalidResponse(
                "Ollama returned an empty message".to_string(),
            ));
        }
        Ok(response.message.content)
    }

    pub(crate) async fn ollama_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LLMError> {
        let config = self.ollama()?;

        let response = self
            .client
            .post(format!("{}/api/embed", config.host))
            .json(&OllamaEmbedRequest {
                model: &config.embedding_model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Status {
                provider: "Ollama",
                status,
                body,
            });
        }

        let body: OllamaEmbedResponse = response.json().await?;
        if body.embeddings.len() != texts.len() {
            return Err(LLMError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}

impl<S> Client<S>
where
    S: HasProvider<Ollama> + Clone + Send + Sync + 'static,
{
    /// Single-turn chat with the default Ollama model.
    ///
    /// Only available once [`Client::with_ollama_at`] has been called.
    pub async fn ollama_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LLMError> {
        self.ollama_generate(None, system_prompt, user_prompt).await
    }
}
