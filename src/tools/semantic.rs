//! Semantic search over a Markdown document.
//!
//! The document is split into heading-led chunks, every chunk is embedded once
//! at index time, and queries are ranked against the stored vectors by cosine
//! similarity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::llm::Embedder;
use crate::tools::{SemanticSearchTool, ToolError};

pub const DEFAULT_CHUNK_CHARS: usize = 800;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    embedding: Vec<f32>,
}

pub struct MarkdownSearch {
    embedder: Arc<dyn Embedder>,
    chunk_chars: usize,
    top_k: usize,
    index: RwLock<HashMap<PathBuf, Vec<IndexedChunk>>>,
}

impl MarkdownSearch {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            top_k: DEFAULT_TOP_K,
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    /// Number of documents currently held in the index.
    pub fn indexed_documents(&self) -> usize {
        match self.index.read() {
            Ok(index) => index.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn chunks_for(&self, path: &Path) -> Result<Vec<IndexedChunk>, ToolError> {
        let index = match self.index.read() {
            Ok(index) => index,
            Err(poisoned) => poisoned.into_inner(),
        };
        index
            .get(path)
            .cloned()
            .ok_or_else(|| ToolError::NotIndexed(path.to_path_buf()))
    }
}

#[async_trait]
impl SemanticSearchTool for MarkdownSearch {
    async fn index(&self, path: &Path) -> Result<usize, ToolError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::io(path, e))?;
        let texts = chunk_markdown(&text, self.chunk_chars);
        let embeddings = self.embedder.embed(&texts).await?;

        let chunks: Vec<IndexedChunk> = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| IndexedChunk { text, embedding })
            .collect();
        let count = chunks.len();
        log::debug!("Indexed {} chunks of {}", count, path.display());

        let mut index = match self.index.write() {
            Ok(index) => index,
            Err(poisoned) => poisoned.into_inner(),
        };
        index.insert(path.to_path_buf(), chunks);
        Ok(count)
    }

    async fn semantic_search(&self, path: &Path, query: &str) -> Result<Vec<String>, ToolError> {
        let chunks = self.chunks_for(path)?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<(f32, IndexedChunk)> = chunks
            .into_iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, chunk)| chunk.text)
            .collect())
    }

    fn release(&self, path: &Path) {
        let mut index = match self.index.write() {
            Ok(index) => index,
            Err(poisoned) => poisoned.into_inner(),
        };
        index.remove(path);
    }
}

/// Splits Markdown into chunks of roughly `max_chars`. A heading always
/// starts a new chunk; a single oversized paragraph stays whole.
pub fn chunk_markdown(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut chunks = Vec::new();
    let mut current = String::new();

    for block in normalized.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let starts_section = block.starts_with('#');
        if !current.is_empty()
            && (starts_section || current.chars().count() + block.chars().count() + 2 > max_chars)
        {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(block);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cosine similarity; zero for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
