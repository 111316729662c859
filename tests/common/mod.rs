//! Scripted providers and counting tools shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobsmith::application::job_application_workflow;
use jobsmith::core::Executor;
use jobsmith::llm::{Embedder, GenerationRequest, Generator, LLMError};
use jobsmith::tools::{
    FileReadTool, LocalFileReader, ScrapeTool, SearchHit, SearchTool, SemanticSearchTool,
    ToolError, ToolboxBuilder,
};
use jobsmith::JobAssistant;

pub const RESEARCHER: &str = "Tech Job Researcher";
pub const PROFILER: &str = "Personal Profiler for Engineers";
pub const STRATEGIST: &str = "Resume Strategist for Engineers";
pub const PREPARER: &str = "Engineering Interview Preparer";

/// Answers every request with `output of <role>`, padded with whitespace,
/// after an optional per-role delay. One role can be told to fail.
#[derive(Default)]
pub struct ScriptedGenerator {
    delays: HashMap<&'static str, Duration>,
    failing: Option<&'static str>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, role: &'static str, delay: Duration) -> Self {
        self.delays.insert(role, delay);
        self
    }

    pub fn failing_on(mut self, role: &'static str) -> Self {
        self.failing = Some(role);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn request_for(&self, role: &str) -> Option<GenerationRequest> {
        self.requests().into_iter().find(|r| r.role == role)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LLMError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delays.get(request.role.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing == Some(request.role.as_str()) {
            return Err(LLMError::Status {
                provider: "Gemini",
                status: reqwest::StatusCode::TOO_MANY_REQUESTS,
                body: "quota exceeded".to_string(),
            });
        }
        Ok(format!("\n  output of {}  \n", request.role))
    }
}

#[derive(Default)]
pub struct CountingSearch {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl SearchTool for CountingSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![SearchHit {
            title: "Result".to_string(),
            link: "https://example.com/result".to_string(),
            snippet: format!("about {}", query),
        }])
    }
}

#[derive(Default)]
pub struct CountingScrape {
    pub urls: Mutex<Vec<String>>,
    failing: Option<String>,
}

impl CountingScrape {
    /// Answers `503` for `url` and succeeds for everything else.
    pub fn failing_on(url: &str) -> Self {
        Self {
            failing: Some(url.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ScrapeTool for CountingScrape {
    async fn scrape(&self, url: &str) -> Result<String, ToolError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.failing.as_deref() == Some(url) {
            return Err(ToolError::Status {
                service: "scraper",
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }
        Ok(format!("page text of {}", url))
    }
}

/// Reads through [`LocalFileReader`] and counts the calls.
pub struct CountingFileRead {
    inner: LocalFileReader,
    pub calls: AtomicUsize,
}

impl Default for CountingFileRead {
    fn default() -> Self {
        Self {
            inner: LocalFileReader::new(10_000),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FileReadTool for CountingFileRead {
    async fn read(&self, path: &Path) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read(path).await
    }
}

#[derive(Default)]
pub struct CountingSemantic {
    pub indexed: AtomicUsize,
    pub searches: AtomicUsize,
}

#[async_trait]
impl SemanticSearchTool for CountingSemantic {
    async fn index(&self, _path: &Path) -> Result<usize, ToolError> {
        self.indexed.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    async fn semantic_search(&self, _path: &Path, query: &str) -> Result<Vec<String>, ToolError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![format!("passage about {}", query)])
    }
}

/// Embeds every text as the same unit vector.
pub struct UnitEmbedder;

#[async_trait]
impl Embedder for UnitEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(texts.iter().map(|_| vec![1.0]).collect())
    }
}

/// Every adapter, with handles kept for assertions.
#[derive(Default, Clone)]
pub struct Tools {
    pub search: Arc<CountingSearch>,
    pub scrape: Arc<CountingScrape>,
    pub file_read: Arc<CountingFileRead>,
    pub semantic: Arc<CountingSemantic>,
}

impl Tools {
    pub fn builder(&self) -> ToolboxBuilder {
        ToolboxBuilder::new()
            .with_search(self.search.clone())
            .with_scrape(self.scrape.clone())
            .with_file_read(self.file_read.clone())
            .with_semantic_search(self.semantic.clone())
    }
}

pub fn assistant(generator: Arc<ScriptedGenerator>, output_root: &Path, tools: &Tools) -> JobAssistant {
    assistant_with(generator, output_root, tools.builder())
}

pub fn assistant_with(
    generator: Arc<ScriptedGenerator>,
    output_root: &Path,
    builder: ToolboxBuilder,
) -> JobAssistant {
    JobAssistant::new(
        job_application_workflow().unwrap(),
        Executor::new(generator, output_root),
        builder,
    )
}

/// Every regular file below `root`.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// Packs the given parts into an in-memory DOCX.
pub fn docx(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

/// A small but realistic resume.
pub fn resume_docx() -> Vec<u8> {
    let body = concat!(
        r#"<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Jane Doe</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t xml:space="preserve">Backend engineer with </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>8 years</w:t></w:r><w:r><w:t xml:space="preserve"> of Rust.</w:t></w:r></w:p>"#,
        r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Experience</w:t></w:r></w:p>"#,
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Built a payments ledger</w:t></w:r></w:p>"#,
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Led a team of four</w:t></w:r></w:p>"#,
    );
    let numbering = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#;
    docx(&[
        ("word/document.xml", &document_xml(body)),
        ("word/numbering.xml", numbering),
    ])
}
