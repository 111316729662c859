//! # jobsmith
//!
//! Tailors a resume and a set of interview notes to one job posting by
//! running a small graph of LLM-backed stages.
//!
//! ## Features
//!
//! - **Stage graph**: stages declare their dependencies; independent stages
//!   run concurrently and every stage sees exactly its upstream outputs
//! - **Resume conversion**: DOCX to semantic HTML to Markdown, no external tools
//! - **Tool adapters**: web search, scraping, file reads and semantic search
//!   over the converted resume, each bound only to the stages that declare it
//! - **Atomic artifacts**: output files appear only when a whole run succeeds
//! - **Pick-and-choose**: the CLI and the HTTP server are feature-gated
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jobsmith::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let assistant = JobAssistant::from_settings(&settings)?;
//!
//! let materials = assistant
//!     .prepare(ApplicationRequest {
//!         job_posting_url: "https://example.com/job/123".to_string(),
//!         personal_writeup: "Backend engineer, eight years of Rust and Go.".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! println!("{}", materials.tailored_resume);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: stages, workflow graph, run context and executor
//! - [`llm`]: provider clients behind the [`llm::Generator`] and [`llm::Embedder`] traits
//! - [`tools`]: tool adapters and per-stage binding
//! - [`convert`]: DOCX to Markdown
//! - [`application`]: the four-stage job-application workflow
//! - [`config`]: environment-driven settings
//! - `server`: axum routes (feature `server`)

pub mod application;
pub mod config;
pub mod convert;
pub mod core;
pub mod llm;
pub mod tools;

#[cfg(feature = "server")]
pub mod server;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use crate::application::{
    ApplicationError, ApplicationMaterials, ApplicationRequest, JobAssistant, ResumeUpload,
};
pub use crate::config::{ConfigError, Settings};
pub use crate::convert::{ConversionError, docx_to_markdown};
pub use crate::core::{
    Capability, Executor, RunOutcome, Stage, StageFailure, Workflow, WorkflowError,
    WorkflowInput,
};
pub use crate::llm::{Client, LLMError};

/// The main prelude: everything needed to configure and run the assistant.
///
/// # Example
/// ```rust
/// use jobsmith::prelude::*;
/// ```
pub mod prelude {
    pub use crate::application::{
        ApplicationError, ApplicationMaterials, ApplicationRequest, JobAssistant, ResumeUpload,
        job_application_workflow,
    };
    pub use crate::config::Settings;
    pub use crate::core::{
        Capability, Executor, Persona, RunOutcome, Stage, ToolRequest, Workflow, WorkflowError,
        WorkflowInput,
    };
    pub use crate::llm::{ContextBlock, Embedder, GenerationRequest, Generator};
    pub use crate::tools::{Toolbox, ToolboxBuilder};
}

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
