//! The provider-neutral generation interface used by the workflow executor.
//!
//! Stages never talk to a concrete provider. They build a [`GenerationRequest`]
//! and hand it to whatever [`Generator`] the executor was constructed with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::error::LLMError;

/// Where a block of context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    /// The published output of an upstream stage.
    Stage,
    /// The result of a tool invocation made on behalf of the stage.
    Tool,
    /// A note from the executor itself (e.g. missing resume).
    Notice,
}

/// A labelled piece of context handed to the model alongside the instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub kind: ContextKind,
    pub label: String,
    pub body: String,
}

impl ContextBlock {
    pub fn stage(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Stage,
            label: name.into(),
            body: output.into(),
        }
    }

    pub fn tool(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Tool,
            label: label.into(),
            body: body.into(),
        }
    }

    pub fn notice(body: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Notice,
            label: "notice".to_string(),
            body: body.into(),
        }
    }
}

/// Everything a provider needs to produce one stage's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub instructions: String,
    pub context: Vec<ContextBlock>,
}

impl GenerationRequest {
    /// Labels of the context blocks of the given kind, in order.
    pub fn context_labels(&self, kind: ContextKind) -> Vec<&str> {
        self.context
            .iter()
            .filter(|block| block.kind == kind)
            .map(|block| block.label.as_str())
            .collect()
    }

    /// The persona half of the prompt.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }

    /// The task half of the prompt: instructions followed by grouped context.
    pub fn user_prompt(&self) -> String {
        let mut prompt = self.instructions.trim().to_string();

        let sections = [
            (ContextKind::Stage, "Context from earlier stages"),
            (ContextKind::Tool, "Research notes"),
        ];
        for (kind, heading) in sections {
            let blocks: Vec<&ContextBlock> =
                self.context.iter().filter(|b| b.kind == kind).collect();
            if blocks.is_empty() {
                continue;
            }
            prompt.push_str(&format!("\n\n# {}\n", heading));
            for block in blocks {
                prompt.push_str(&format!("\n## {}\n{}\n", block.label, block.body.trim()));
            }
        }

        let notices: Vec<&ContextBlock> = self
            .context
            .iter()
            .filter(|b| b.kind == ContextKind::Notice)
            .collect();
        if !notices.is_empty() {
            prompt.push_str("\n\n# Notes\n");
            for notice in notices {
                prompt.push_str(&format!("- {}\n", notice.body.trim()));
            }
        }

        prompt
    }
}

/// Produces text for a [`GenerationRequest`].
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LLMError>;
}

/// Produces one embedding vector per input text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LLMError>;
}
