//! Stage graph, run context and the executor that drives them.

pub mod context;
pub mod error;
pub mod executor;
pub mod input;
pub mod stage;
pub mod storage;
pub mod telemetry;
pub mod validation;
pub mod workflow;

pub use context::RunContext;
pub use error::{CapabilityUnavailable, DefinitionError, StageFailure, WorkflowError};
pub use executor::{DEFAULT_STAGE_TIMEOUT, Executor, RunOutcome, StageOutput};
pub use input::{ValidationError, WorkflowInput};
pub use stage::{Capability, Persona, Stage, StageBuilder, ToolRequest};
pub use storage::ArtifactStore;
pub use telemetry::{LogTelemetry, MemoryTelemetry, StageOutcome, Telemetry, TraceEntry};
pub use validation::{ValidationIssue, ValidationResult};
pub use workflow::{Workflow, WorkflowBuilder};
