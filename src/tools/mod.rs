//! External data access for stages: web search, web scrape, file read and
//! semantic search over the resume.
//!
//! Adapters sit behind one trait per capability. A [`ToolboxBuilder`] holds the
//! configured adapters; [`ToolboxBuilder::resolve`] binds them to one run's
//! resume, and [`Toolbox::bind`] narrows the result to what a stage declared.

pub mod error;
pub mod file_read;
pub mod scrape;
pub mod semantic;
pub mod serper;

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::core::error::CapabilityUnavailable;
use crate::core::input::WorkflowInput;
use crate::core::stage::{Capability, ToolRequest};
use crate::llm::ContextBlock;

pub use error::ToolError;
pub use file_read::LocalFileReader;
pub use scrape::WebScraper;
pub use semantic::MarkdownSearch;
pub use serper::SerperSearch;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError>;
}

#[async_trait]
pub trait ScrapeTool: Send + Sync {
    /// Fetches `url` and returns its readable text.
    async fn scrape(&self, url: &str) -> Result<String, ToolError>;
}

#[async_trait]
pub trait FileReadTool: Send + Sync {
    async fn read(&self, path: &Path) -> Result<String, ToolError>;
}

#[async_trait]
pub trait SemanticSearchTool: Send + Sync {
    /// Prepares `path` for searching. Returns the number of indexed chunks.
    async fn index(&self, path: &Path) -> Result<usize, ToolError>;

    /// Passages of an indexed document most relevant to `query`, best first.
    async fn semantic_search(&self, path: &Path, query: &str) -> Result<Vec<String>, ToolError>;

    /// Drops whatever [`index`](Self::index) kept for `path`.
    fn release(&self, _path: &Path) {}
}

/// Cuts `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(out, "Title: {}\nLink: {}\nSnippet: {}\n---", hit.title, hit.link, hit.snippet);
    }
    out.trim_end().to_string()
}

/// Adapters configured for the process, before any run binds them.
#[derive(Clone, Default)]
pub struct ToolboxBuilder {
    search: Option<Arc<dyn SearchTool>>,
    scrape: Option<Arc<dyn ScrapeTool>>,
    file_read: Option<Arc<dyn FileReadTool>>,
    semantic: Option<Arc<dyn SemanticSearchTool>>,
}

impl ToolboxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, tool: Arc<dyn SearchTool>) -> Self {
        self.search = Some(tool);
        self
    }

    pub fn with_scrape(mut self, tool: Arc<dyn ScrapeTool>) -> Self {
        self.scrape = Some(tool);
        self
    }

    pub fn with_file_read(mut self, tool: Arc<dyn FileReadTool>) -> Self {
        self.file_read = Some(tool);
        self
    }

    pub fn with_semantic_search(mut self, tool: Arc<dyn SemanticSearchTool>) -> Self {
        self.semantic = Some(tool);
        self
    }

    /// Binds the configured adapters to this run's resume.
    ///
    /// Nothing here fails the run: an adapter that is missing, a missing
    /// resume, or a resume that cannot be indexed leaves the capability
    /// unbound and is reported in [`Resolution::unavailable`].
    pub async fn resolve(&self, document: Option<&Path>) -> Resolution {
        let mut unavailable = Vec::new();
        let mut toolbox = Toolbox::empty();
        let mut indexed_by = None;

        match &self.search {
            Some(tool) => toolbox.search = Some(Arc::clone(tool)),
            None => unavailable.push(CapabilityUnavailable::new(
                Capability::WebSearch,
                "no search provider is configured",
            )),
        }
        match &self.scrape {
            Some(tool) => toolbox.scrape = Some(Arc::clone(tool)),
            None => unavailable.push(CapabilityUnavailable::new(
                Capability::WebScrape,
                "no scraper is configured",
            )),
        }

        match document {
            None => {
                for capability in [Capability::FileRead, Capability::SemanticDocumentSearch] {
                    unavailable.push(CapabilityUnavailable::new(capability, "no resume was provided"));
                }
            }
            Some(path) => {
                match &self.file_read {
                    Some(tool) => toolbox.file_read = Some(Arc::clone(tool)),
                    None => unavailable.push(CapabilityUnavailable::new(
                        Capability::FileRead,
                        "no file reader is configured",
                    )),
                }
                match &self.semantic {
                    Some(tool) => match tool.index(path).await {
                        Ok(_) => {
                            toolbox.semantic = Some(Arc::clone(tool));
                            indexed_by = Some(Arc::clone(tool));
                        }
                        Err(e) => unavailable.push(CapabilityUnavailable::new(
                            Capability::SemanticDocumentSearch,
                            format!("indexing the resume failed: {}", e),
                        )),
                    },
                    None => unavailable.push(CapabilityUnavailable::new(
                        Capability::SemanticDocumentSearch,
                        "no embedding provider is configured",
                    )),
                }
                if toolbox.file_read.is_some() || toolbox.semantic.is_some() {
                    toolbox.document = Some(Arc::new(DocumentLease {
                        path: path.to_path_buf(),
                        indexed_by,
                    }));
                }
            }
        }

        for missing in &unavailable {
            log::warn!("{}", missing);
        }
        Resolution {
            toolbox,
            unavailable,
        }
    }
}

/// A run's bound toolbox plus the capabilities that could not be bound.
pub struct Resolution {
    pub toolbox: Toolbox,
    pub unavailable: Vec<CapabilityUnavailable>,
}

/// A run's resume. Dropping the last handle releases its semantic index.
struct DocumentLease {
    path: PathBuf,
    indexed_by: Option<Arc<dyn SemanticSearchTool>>,
}

impl Drop for DocumentLease {
    fn drop(&mut self) {
        if let Some(tool) = self.indexed_by.take() {
            tool.release(&self.path);
            log::debug!("Released index of {}", self.path.display());
        }
    }
}

/// Adapters bound for one run.
#[derive(Clone, Default)]
pub struct Toolbox {
    search: Option<Arc<dyn SearchTool>>,
    scrape: Option<Arc<dyn ScrapeTool>>,
    file_read: Option<Arc<dyn FileReadTool>>,
    semantic: Option<Arc<dyn SemanticSearchTool>>,
    document: Option<Arc<DocumentLease>>,
}

impl Toolbox {
    /// A toolbox with nothing bound.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&Path> {
        self.document.as_deref().map(|lease| lease.path.as_path())
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::WebSearch => self.search.is_some(),
            Capability::WebScrape => self.scrape.is_some(),
            Capability::FileRead => self.file_read.is_some() && self.document.is_some(),
            Capability::SemanticDocumentSearch => {
                self.semantic.is_some() && self.document.is_some()
            }
        }
    }

    pub fn available(&self) -> BTreeSet<Capability> {
        Capability::ALL.into_iter().filter(|c| self.has(*c)).collect()
    }

    /// Narrows the toolbox to the capabilities a stage declared.
    pub fn bind(&self, requested: &BTreeSet<Capability>) -> StageTools<'_> {
        let (granted, missing) = requested.iter().partition(|c| self.has(**c));
        StageTools {
            toolbox: self,
            granted,
            missing,
        }
    }
}

/// The tools one stage may use.
pub struct StageTools<'a> {
    toolbox: &'a Toolbox,
    granted: BTreeSet<Capability>,
    missing: BTreeSet<Capability>,
}

impl<'a> StageTools<'a> {
    pub fn granted(&self) -> &BTreeSet<Capability> {
        &self.granted
    }

    /// Declared capabilities that are not bound for this run.
    pub fn missing(&self) -> &BTreeSet<Capability> {
        &self.missing
    }

    /// Whether any resume-reading capability is granted.
    pub fn has_document(&self) -> bool {
        self.granted.iter().any(Capability::needs_document)
    }

    /// Runs every request that can run, concurrently, and returns the
    /// observations in request order.
    ///
    /// Requests for an ungranted capability, or whose template refers to an
    /// absent input, are skipped. The first tool error fails the whole call.
    pub async fn gather(
        &self,
        requests: &[ToolRequest],
        input: &WorkflowInput,
    ) -> Result<Vec<ContextBlock>, ToolError> {
        let calls: Vec<ToolCall<'a>> = requests
            .iter()
            .filter_map(|request| self.plan(request, input))
            .collect();
        try_join_all(calls.into_iter().map(ToolCall::run)).await
    }

    fn plan(&self, request: &ToolRequest, input: &WorkflowInput) -> Option<ToolCall<'a>> {
        if !self.granted.contains(&request.capability) {
            log::debug!("Skipping {} request: capability not bound", request.capability);
            return None;
        }

        let argument = match request.capability {
            Capability::FileRead => String::new(),
            _ => match input.try_interpolate(&request.argument) {
                Some(argument) if !argument.trim().is_empty() => argument,
                _ => {
                    log::info!(
                        "Skipping {} request '{}': input not provided",
                        request.capability,
                        request.argument
                    );
                    return None;
                }
            },
        };

        let toolbox = self.toolbox;
        match request.capability {
            Capability::WebSearch => Some(ToolCall::Search(toolbox.search.as_deref()?, argument)),
            Capability::WebScrape => Some(ToolCall::Scrape(toolbox.scrape.as_deref()?, argument)),
            Capability::FileRead => Some(ToolCall::Read(
                toolbox.file_read.as_deref()?,
                toolbox.document()?,
            )),
            Capability::SemanticDocumentSearch => Some(ToolCall::Semantic(
                toolbox.semantic.as_deref()?,
                toolbox.document()?,
                argument,
            )),
        }
    }
}

enum ToolCall<'a> {
    Search(&'a dyn SearchTool, String),
    Scrape(&'a dyn ScrapeTool, String),
    Read(&'a dyn FileReadTool, &'a Path),
    Semantic(&'a dyn SemanticSearchTool, &'a Path, String),
}

impl ToolCall<'_> {
    async fn run(self) -> Result<ContextBlock, ToolError> {
        match self {
            ToolCall::Search(tool, query) => {
                let hits = tool.search(&query).await?;
                Ok(ContextBlock::tool(
                    format!("{}: {}", Capability::WebSearch, query),
                    render_hits(&hits),
                ))
            }
            ToolCall::Scrape(tool, url) => {
                let text = tool.scrape(&url).await?;
                Ok(ContextBlock::tool(format!("{}: {}", Capability::WebScrape, url), text))
            }
            ToolCall::Read(tool, path) => {
                let text = tool.read(path).await?;
                Ok(ContextBlock::tool(format!("{}: resume", Capability::FileRead), text))
            }
            ToolCall::Semantic(tool, path, query) => {
                let passages = tool.semantic_search(path, &query).await?;
                let body = if passages.is_empty() {
                    "No matching passages.".to_string()
                } else {
                    passages.join("\n\n---\n\n")
                };
                Ok(ContextBlock::tool(
                    format!("{}: {}", Capability::SemanticDocumentSearch, query),
                    body,
                ))
            }
        }
    }
}
