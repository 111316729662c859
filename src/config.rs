//! Environment-driven settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{Client, Embedder, Generator};
use crate::tools::{LocalFileReader, MarkdownSearch, SerperSearch, ToolboxBuilder, WebScraper};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_OLLAMA_MODEL: &str = "phi4";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no generation provider configured: set GEMINI_API_KEY or OLLAMA_HOST")]
    NoProvider,

    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Which backend [`Settings::models`] will build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_embedding_model: String,
    pub ollama_host: Option<String>,
    pub ollama_model: String,
    pub ollama_embedding_model: String,
    pub serper_api_key: Option<String>,
    /// Runs write to `<output_dir>/<run-id>/`.
    pub output_dir: PathBuf,
    /// `None` disables the per-stage timeout.
    pub stage_timeout: Option<Duration>,
    pub http_timeout: Duration,
    /// Character budget for scraped pages and file reads.
    pub tool_max_chars: usize,
    pub bind: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let stage_timeout_secs: u64 =
            parse(get("JOBSMITH_STAGE_TIMEOUT_SECS"), "JOBSMITH_STAGE_TIMEOUT_SECS", 300)?;
        let http_timeout_secs: u64 =
            parse(get("JOBSMITH_HTTP_TIMEOUT_SECS"), "JOBSMITH_HTTP_TIMEOUT_SECS", 60)?;
        let tool_max_chars: usize =
            parse(get("JOBSMITH_TOOL_MAX_CHARS"), "JOBSMITH_TOOL_MAX_CHARS", 20_000)?;
        let bind = get("JOBSMITH_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = SocketAddr::from_str(&bind).map_err(|e| ConfigError::Invalid {
            name: "JOBSMITH_BIND",
            value: bind.clone(),
            reason: e.to_string(),
        })?;

        if http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "JOBSMITH_HTTP_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: or("GEMINI_MODEL_NAME", DEFAULT_GEMINI_MODEL),
            gemini_embedding_model: or("GEMINI_EMBEDDING_MODEL", DEFAULT_GEMINI_EMBEDDING_MODEL),
            ollama_host: get("OLLAMA_HOST"),
            ollama_model: or("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
            ollama_embedding_model: or("OLLAMA_EMBEDDING_MODEL", DEFAULT_OLLAMA_EMBEDDING_MODEL),
            serper_api_key: get("SERPER_API_KEY"),
            output_dir: get("JOBSMITH_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("jobsmith")),
            stage_timeout: (stage_timeout_secs > 0).then(|| Duration::from_secs(stage_timeout_secs)),
            http_timeout: Duration::from_secs(http_timeout_secs),
            tool_max_chars,
            bind,
        })
    }

    /// Gemini when a key is set, otherwise Ollama when a host is set.
    pub fn provider(&self) -> Option<Provider> {
        if self.gemini_api_key.is_some() {
            Some(Provider::Gemini)
        } else if self.ollama_host.is_some() {
            Some(Provider::Ollama)
        } else {
            None
        }
    }

    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        Ok(reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    /// Builds the generator and embedder; both share one provider client.
    pub fn models(
        &self,
        http: reqwest::Client,
    ) -> Result<(Arc<dyn Generator>, Arc<dyn Embedder>), ConfigError> {
        match (self.provider(), &self.gemini_api_key, &self.ollama_host) {
            (Some(Provider::Gemini), Some(key), _) => {
                let mut client = Client::from_http(http).with_gemini(key.clone());
                client.edit_gemini_default_model(&self.gemini_model);
                client.edit_gemini_embedding_model(&self.gemini_embedding_model);
                log::info!("Using Gemini model {}", self.gemini_model);
                let client = Arc::new(client);
                let generator: Arc<dyn Generator> = client.clone();
                let embedder: Arc<dyn Embedder> = client;
                Ok((generator, embedder))
            }
            (Some(Provider::Ollama), _, Some(host)) => {
                let mut client = Client::from_http(http).with_ollama_at(host.clone());
                client.edit_ollama_default_model(&self.ollama_model);
                client.edit_ollama_embedding_model(&self.ollama_embedding_model);
                log::info!("Using Ollama model {} at {}", self.ollama_model, host);
                let client = Arc::new(client);
                let generator: Arc<dyn Generator> = client.clone();
                let embedder: Arc<dyn Embedder> = client;
                Ok((generator, embedder))
            }
            _ => Err(ConfigError::NoProvider),
        }
    }

    /// Adapters for every capability this configuration can serve.
    pub fn toolbox(&self, http: reqwest::Client, embedder: Arc<dyn Embedder>) -> ToolboxBuilder {
        let mut builder = ToolboxBuilder::new()
            .with_scrape(Arc::new(WebScraper::new(http.clone(), self.tool_max_chars)))
            .with_file_read(Arc::new(LocalFileReader::new(self.tool_max_chars)))
            .with_semantic_search(Arc::new(MarkdownSearch::new(embedder)));
        match &self.serper_api_key {
            Some(key) => {
                builder = builder.with_search(Arc::new(SerperSearch::new(http, key.clone())))
            }
            None => log::warn!("SERPER_API_KEY is not set; web search is disabled"),
        }
        builder
    }
}

fn parse<T: FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
