use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::stage::Capability;
use crate::llm::LLMError;
use crate::tools::ToolError;

/// Why a single stage did not produce output.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("generation failed: {0}")]
    Provider(#[from] LLMError),

    #[error("tool call failed: {0}")]
    Tool(#[from] ToolError),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("the model returned an empty response")]
    EmptyOutput,
}

/// Errors that abort a workflow run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("stage '{stage}' failed: {cause}")]
    Stage {
        stage: String,
        #[source]
        cause: StageFailure,
    },

    #[error("stage '{0}' already published its output")]
    AlreadyPublished(String),

    #[error("no runnable stages left; waiting on: {}", .0.join(", "))]
    Stalled(Vec<String>),

    #[error("run was cancelled")]
    Cancelled,

    #[error("artifact storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WorkflowError {
    /// Name of the stage that failed, if the error is stage-scoped.
    pub fn stage(&self) -> Option<&str> {
        match self {
            WorkflowError::Stage { stage, .. } | WorkflowError::AlreadyPublished(stage) => {
                Some(stage)
            }
            _ => None,
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WorkflowError::Storage {
            path: path.into(),
            source,
        }
    }
}

/// A workflow whose stages do not form a valid graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid workflow definition: {}", .issues.join("; "))]
pub struct DefinitionError {
    pub issues: Vec<String>,
}

/// A capability that could not be bound for this run. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{capability} unavailable: {reason}")]
pub struct CapabilityUnavailable {
    pub capability: Capability,
    pub reason: String,
}

impl CapabilityUnavailable {
    pub fn new(capability: Capability, reason: impl Into<String>) -> Self {
        Self {
            capability,
            reason: reason.into(),
        }
    }
}
