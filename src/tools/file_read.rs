use std::path::Path;

use async_trait::async_trait;

use crate::tools::{FileReadTool, ToolError, truncate_chars};

/// Reads UTF-8 text files from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileReader {
    max_chars: usize,
}

impl LocalFileReader {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait]
impl FileReadTool for LocalFileReader {
    async fn read(&self, path: &Path) -> Result<String, ToolError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::io(path, e))?;
        Ok(truncate_chars(&text, self.max_chars))
    }
}
