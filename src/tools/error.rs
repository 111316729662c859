use std::path::PathBuf;

use thiserror::Error;

use crate::llm::LLMError;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not convert page to text: {0}")]
    Html(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] LLMError),

    #[error("{} has not been indexed", .0.display())]
    NotIndexed(PathBuf),
}

impl ToolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::Io {
            path: path.into(),
            source,
        }
    }
}
