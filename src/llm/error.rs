use thiserror::Error;

/// Failures talking to a generation or embedding provider.
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Gemini error: {0}")]
    GeminiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
