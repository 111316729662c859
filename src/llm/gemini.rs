//! Google Gemini LLM client
//!
//! Supports the Gemini API for text generation and batch embeddings.

use serde::{Deserialize, Serialize};

use crate::llm::{Client, HasProvider, error::LLMError};

/// Marker type for Gemini provider
pub struct Gemini;

/// Configuration for Gemini client
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,
    /// Base URL (default: https://generativelanguage.googleapis.com)
    pub base_url: String,
    /// Model used for generation when none is given
    pub default_model: String,
    /// Model used for embeddings
    pub embedding_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            default_model: "gemini-2.0-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
        }
    }
}

/// Request structure for Gemini generate content
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

/// Content structure for Gemini
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A part of content (text, image, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart {
                text: Some(text.into()),
            }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Some("user"), text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::text(Some("model"), text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        // System instructions don't have a role
        Self::text(None, text)
    }

    /// Concatenated text of every part.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Generation configuration for Gemini
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GeminiGenerationConfig {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: Some(0.95),
            top_k: Some(40),
            max_output_tokens: None,
            stop_sequences: None,
        }
    }
}

/// Response from Gemini generate content
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsageMetadata>,
}

impl GeminiResponse {
    /// Text of the first candidate, or an error explaining why there is none.
    pub fn into_text(self) -> Result<String, LLMError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LLMError::GeminiError(format!("prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::InvalidResponse("No candidates in response".to_string()))?;

        let text = candidate.content.joined_text();
        if text.trim().is_empty() {
            return Err(LLMError::InvalidResponse(format!(
                "No text in response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: GeminiContent,
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<GeminiSafetyRating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiSafetyRating {
    pub category: String,
    pub probability: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[derive(Debug, Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
}

#[derive(Debug, Serialize)]
struct GeminiBatchEmbedRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

impl<S> Client<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn gemini(&self) -> Result<&GeminiConfig, LLMError> {
        self.gemini_config
            .as_ref()
            .ok_or_else(|| LLMError::ProviderNotConfigured("Gemini not configured".to_string()))
    }

    pub(crate) async fn send_gemini(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, LLMError> {
        let config = self.gemini()?;
        let url = format!("{}/v1beta/models/{}:generateContent", config.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &config.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Status {
                provider: "Gemini",
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub(crate) async fn gemini_generate(
        &self,
        model: Option<String>,
        system_prompt: &str,
        user_prompt: &str,
        generation_config: Option<GeminiGenerationConfig>,
    ) -> Result<String, LLMError> {
        let config = self.gemini()?;
        let model = model.unwrap_or_else(|| config.default_model.clone());

        let request = GeminiRequest {
            contents: vec![GeminiContent::user(user_prompt)],
            system_instruction: Some(GeminiContent::system(system_prompt)),
            generation_config: Some(generation_config.unwrap_or_default()),
        };

        self.send_gemini(&model, &request).await?.into_text()
    }

    pub(crate) async fn gemini_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LLMError> {
        let config = self.gemini()?;
        let model = &config.embedding_model;
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            config.base_url, model
        );

        let request = GeminiBatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| GeminiEmbedRequest {
                    model: format!("models/{}", model),
                    content: GeminiContent::text(None, text.clone()),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Status {
                provider: "Gemini",
                status,
                body,
            });
        }

        let body: GeminiBatchEmbedResponse = response.json().await?;
        if body.embeddings.len() != texts.len() {
            return Err(LLMError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

impl<S> Client<S>
where
    S: HasProvider<Gemini> + Clone + Send + Sync + 'static,
{
    /// Single-turn completion with the default Gemini model.
    ///
    /// Only available once [`Client::with_gemini`] has been called.
    pub async fn gemini_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LLMError> {
        self.gemini_generate(None, system_prompt, user_prompt, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_gemini_content_constructors() {
        let user = GeminiContent::user("Hello");
        assert_eq!(user.role, Some("user".to_string()));

        let model = GeminiContent::model("Hi there!");
        assert_eq!(model.role, Some("model".to_string()));

        let system = GeminiContent::system("Be helpful");
        assert_eq!(system.role, None);
    }

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiRequest {
            contents: vec![GeminiContent::user("Test")],
            system_instruction: Some(GeminiContent::system("Be concise")),
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(0.5),
                ..Default::default()
            }),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("contents"));
        assert!(json.contains("systemInstruction")); // camelCase
        assert!(json.contains("generationConfig"));
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_gemini_complete_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "Be terse" }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Hello" }, { "text": " world" }] },
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let client = Client::new().with_gemini_at("test-key", server.uri());
        let text = client.gemini_complete("Be terse", "Say hi").await.unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_gemini_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let client = Client::new().with_gemini_at("test-key", server.uri());
        let err = client.gemini_complete("s", "u").await.unwrap_err();
        match &err {
            LLMError::Status {
                provider,
                status,
                body,
            } => {
                assert_eq!(*provider, "Gemini");
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "quota exhausted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Gemini returned HTTP 429 Too Many Requests: quota exhausted"
        );
    }

    #[tokio::test]
    async fn test_gemini_batch_embeddings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [ { "values": [1.0, 0.0] }, { "values": [0.0, 1.0] } ]
            })))
            .mount(&server)
            .await;

        let client = Client::new().with_gemini_at("test-key", server.uri());
        let vectors = client
            .gemini_embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
