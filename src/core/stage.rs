//! Stage definitions: who runs a unit of work, what it may touch, and what it depends on.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named external data-access ability a stage may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    WebSearch,
    WebScrape,
    FileRead,
    SemanticDocumentSearch,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::WebSearch,
        Capability::WebScrape,
        Capability::FileRead,
        Capability::SemanticDocumentSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::WebSearch => "web-search",
            Capability::WebScrape => "web-scrape",
            Capability::FileRead => "file-read",
            Capability::SemanticDocumentSearch => "semantic-document-search",
        }
    }

    /// Capabilities that only make sense when a resume document exists.
    pub fn needs_document(&self) -> bool {
        matches!(self, Capability::FileRead | Capability::SemanticDocumentSearch)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persona the model is asked to adopt for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl Persona {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }
}

/// One tool invocation a stage performs before generating.
///
/// `argument` is a template over the workflow input (`{job_posting_url}` etc.).
/// For [`Capability::FileRead`] it is ignored: the bound document is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub capability: Capability,
    pub argument: String,
}

impl ToolRequest {
    pub fn scrape(url: impl Into<String>) -> Self {
        Self {
            capability: Capability::WebScrape,
            argument: url.into(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            capability: Capability::WebSearch,
            argument: query.into(),
        }
    }

    pub fn read_document() -> Self {
        Self {
            capability: Capability::FileRead,
            argument: String::new(),
        }
    }

    pub fn search_document(query: impl Into<String>) -> Self {
        Self {
            capability: Capability::SemanticDocumentSearch,
            argument: query.into(),
        }
    }
}

/// One unit of text-generation work with declared dependencies and capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    name: String,
    persona: Persona,
    description: String,
    expected_output: String,
    capabilities: BTreeSet<Capability>,
    depends_on: Vec<String>,
    tool_requests: Vec<ToolRequest>,
    output_file: Option<String>,
}

impl Stage {
    pub fn builder(name: impl Into<String>) -> StageBuilder {
        StageBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// The task template; placeholders are filled from the workflow input.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn tool_requests(&self) -> &[ToolRequest] {
        &self.tool_requests
    }

    /// File name (inside the run directory) the output is persisted to.
    pub fn output_file(&self) -> Option<&str> {
        self.output_file.as_deref()
    }

    /// Whether the stage asked for any capability that reads the resume.
    pub fn wants_document(&self) -> bool {
        self.capabilities.iter().any(Capability::needs_document)
    }
}

/// Builder for [`Stage`].
pub struct StageBuilder {
    name: String,
    persona: Option<Persona>,
    description: Option<String>,
    expected_output: String,
    capabilities: BTreeSet<Capability>,
    depends_on: Vec<String>,
    tool_requests: Vec<ToolRequest>,
    output_file: Option<String>,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: None,
            description: None,
            expected_output: String::new(),
            capabilities: BTreeSet::new(),
            depends_on: Vec::new(),
            tool_requests: Vec::new(),
            output_file: None,
        }
    }

    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = Some(persona);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Adds a dependency; repeated names are kept once, in first-seen order.
    pub fn depends_on(mut self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        if !self.depends_on.contains(&stage) {
            self.depends_on.push(stage);
        }
        self
    }

    pub fn tool(mut self, request: ToolRequest) -> Self {
        self.tool_requests.push(request);
        self
    }

    pub fn output_file(mut self, file_name: impl Into<String>) -> Self {
        self.output_file = Some(file_name.into());
        self
    }

    /// Builds the stage. A missing persona or description is a definition error.
    pub fn build(self) -> Result<Stage, String> {
        if self.name.trim().is_empty() {
            return Err("stage name cannot be empty".to_string());
        }
        let persona = self
            .persona
            .ok_or_else(|| format!("stage '{}' has no persona", self.name))?;
        let description = self
            .description
            .ok_or_else(|| format!("stage '{}' has no description", self.name))?;

        Ok(Stage {
            name: self.name,
            persona,
            description,
            expected_output: self.expected_output,
            capabilities: self.capabilities,
            depends_on: self.depends_on,
            tool_requests: self.tool_requests,
            output_file: self.output_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> Persona {
        Persona::new("Researcher", "Find things", "Has found things before.")
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::WebSearch.to_string(), "web-search");
        assert_eq!(
            serde_json::to_string(&Capability::SemanticDocumentSearch).unwrap(),
            "\"semantic-document-search\""
        );
        assert!(Capability::FileRead.needs_document());
        assert!(!Capability::WebScrape.needs_document());
    }

    #[test]
    fn test_stage_builder() {
        let stage = Stage::builder("tailor")
            .persona(persona())
            .description("Tailor it for {job_posting_url}")
            .expected_output("A resume")
            .capabilities([Capability::FileRead, Capability::WebSearch])
            .depends_on("a")
            .depends_on("b")
            .depends_on("a")
            .tool(ToolRequest::read_document())
            .output_file("resume.md")
            .build()
            .unwrap();

        assert_eq!(stage.name(), "tailor");
        assert_eq!(stage.depends_on(), ["a".to_string(), "b".to_string()]);
        assert_eq!(stage.output_file(), Some("resume.md"));
        assert!(stage.wants_document());
        assert_eq!(stage.tool_requests().len(), 1);
    }

    #[test]
    fn test_stage_builder_requires_persona_and_description() {
        let err = Stage::builder("x").description("d").build().unwrap_err();
        assert!(err.contains("persona"));

        let err = Stage::builder("x").persona(persona()).build().unwrap_err();
        assert!(err.contains("description"));

        assert!(Stage::builder(" ").persona(persona()).description("d").build().is_err());
    }
}
