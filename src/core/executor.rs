//! Dependency-driven execution of a [`Workflow`].
//!
//! Every stage whose dependencies have published is started right away and
//! polled alongside the others on a single `FuturesUnordered`. The first
//! failure aborts the run: in-flight stages are dropped and nothing staged
//! for disk is finalized.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::context::RunContext;
use crate::core::error::{StageFailure, WorkflowError};
use crate::core::input::WorkflowInput;
use crate::core::stage::Stage;
use crate::core::storage::ArtifactStore;
use crate::core::telemetry::{StageOutcome, Telemetry, TraceEntry};
use crate::core::workflow::Workflow;
use crate::llm::{ContextBlock, GenerationRequest, Generator};
use crate::tools::Toolbox;

pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

const NO_RESUME_NOTICE: &str = "No resume is available for this run. Work only from the \
     personal write-up, the public profile and the earlier stage outputs, and do not \
     invent resume content.";

/// Output of one stage, in workflow declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput {
    pub name: String,
    pub output: String,
    /// Where the output was written, for persisted stages.
    pub destination: Option<PathBuf>,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub stages: Vec<StageOutput>,
}

impl RunOutcome {
    pub fn output(&self, stage: &str) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.name == stage)
            .map(|s| s.output.as_str())
    }

    pub fn destination(&self, stage: &str) -> Option<&Path> {
        self.stages
            .iter()
            .find(|s| s.name == stage)
            .and_then(|s| s.destination.as_deref())
    }

    /// `(stage, output)` pairs.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stages
            .iter()
            .map(|s| (s.name.as_str(), s.output.as_str()))
    }

    /// Finalized files, in stage order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.stages.iter().filter_map(|s| s.destination.as_deref())
    }
}

/// Runs workflows against one generator, writing artifacts under `output_root`.
pub struct Executor {
    generator: Arc<dyn Generator>,
    output_root: PathBuf,
    stage_timeout: Option<Duration>,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl Executor {
    pub fn new(generator: Arc<dyn Generator>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            output_root: output_root.into(),
            stage_timeout: Some(DEFAULT_STAGE_TIMEOUT),
            telemetry: None,
        }
    }

    /// `None` lets a stage run for as long as its calls take.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    pub async fn run(
        &self,
        workflow: &Workflow,
        input: &WorkflowInput,
        toolbox: &Toolbox,
    ) -> Result<RunOutcome, WorkflowError> {
        self.run_until_cancelled(workflow, input, toolbox, &CancellationToken::new())
            .await
    }

    /// Runs the workflow, stopping with [`WorkflowError::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn run_until_cancelled(
        &self,
        workflow: &Workflow,
        input: &WorkflowInput,
        toolbox: &Toolbox,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, WorkflowError> {
        let run_id = Uuid::new_v4();
        log::info!("Starting run {} with {} stages", run_id, workflow.len());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("Run {} cancelled", run_id);
                Err(WorkflowError::Cancelled)
            }
            result = self.execute(run_id, workflow, input, toolbox) => result,
        };

        if let Some(telemetry) = &self.telemetry {
            telemetry.flush();
        }
        result
    }

    async fn execute(
        &self,
        run_id: Uuid,
        workflow: &Workflow,
        input: &WorkflowInput,
        toolbox: &Toolbox,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut store = ArtifactStore::create(&self.output_root, run_id)?;
        let mut ctx = RunContext::new();
        let mut pending: Vec<&Stage> = workflow.execution_order().collect();
        let mut running = FuturesUnordered::new();

        loop {
            let (ready, waiting): (Vec<&Stage>, Vec<&Stage>) = pending
                .into_iter()
                .partition(|stage| ctx.satisfies(stage.depends_on()));
            pending = waiting;

            for stage in ready {
                let context = ctx.blocks_for(stage.depends_on());
                running.push(self.run_stage(run_id, stage, context, input, toolbox));
            }

            let Some((stage, result)) = running.next().await else {
                if pending.is_empty() {
                    break;
                }
                return Err(WorkflowError::Stalled(
                    pending.iter().map(|s| s.name().to_string()).collect(),
                ));
            };

            let output = result.map_err(|cause| {
                log::error!("Stage '{}' failed: {}", stage.name(), cause);
                WorkflowError::Stage {
                    stage: stage.name().to_string(),
                    cause,
                }
            })?;

            if let Some(file_name) = stage.output_file() {
                store.stage(stage.name(), file_name, &output)?;
            }
            ctx.publish(stage.name(), output)?;
        }

        let destinations: HashMap<String, PathBuf> = store.commit()?.into_iter().collect();
        let stages = workflow
            .stages()
            .iter()
            .map(|stage| StageOutput {
                name: stage.name().to_string(),
                output: ctx.take(stage.name()).unwrap_or_default(),
                destination: destinations.get(stage.name()).cloned(),
            })
            .collect();

        log::info!("Run {} finished", run_id);
        Ok(RunOutcome { run_id, stages })
    }

    async fn run_stage<'a>(
        &'a self,
        run_id: Uuid,
        stage: &'a Stage,
        context: Vec<ContextBlock>,
        input: &'a WorkflowInput,
        toolbox: &'a Toolbox,
    ) -> (&'a Stage, Result<String, StageFailure>) {
        let started = Instant::now();
        let context_sources: Vec<String> = context.iter().map(|b| b.label.clone()).collect();
        log::info!(
            "Stage '{}' started ({} upstream outputs)",
            stage.name(),
            context_sources.len()
        );

        let work = self.attempt(stage, context, input, toolbox);
        let result = match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(StageFailure::TimedOut(limit)),
            },
            None => work.await,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let (tool_calls, output_chars, outcome) = match &result {
            Ok((output, calls)) => {
                log::info!("Stage '{}' finished in {} ms", stage.name(), duration_ms);
                (*calls, output.chars().count(), StageOutcome::Completed)
            }
            Err(e) => (0, 0, StageOutcome::Failed(e.to_string())),
        };

        if let Some(telemetry) = &self.telemetry {
            telemetry.record(TraceEntry {
                timestamp: Utc::now(),
                run_id,
                stage: stage.name().to_string(),
                role: stage.persona().role.clone(),
                capabilities: stage.capabilities().iter().copied().collect(),
                tool_calls,
                context_sources,
                duration_ms,
                output_chars,
                outcome,
            });
        }

        (stage, result.map(|(output, _)| output))
    }

    /// Gathers tool observations, then generates. Returns the trimmed output
    /// and the number of tool calls made.
    async fn attempt(
        &self,
        stage: &Stage,
        mut context: Vec<ContextBlock>,
        input: &WorkflowInput,
        toolbox: &Toolbox,
    ) -> Result<(String, usize), StageFailure> {
        let tools = toolbox.bind(stage.capabilities());
        for capability in tools.missing() {
            log::debug!("Stage '{}' runs without {}", stage.name(), capability);
        }

        let observations = tools.gather(stage.tool_requests(), input).await?;
        let tool_calls = observations.len();
        context.extend(observations);

        if stage.wants_document() && !tools.has_document() {
            context.push(ContextBlock::notice(NO_RESUME_NOTICE));
        }

        let persona = stage.persona();
        let request = GenerationRequest {
            role: input.interpolate(&persona.role),
            goal: input.interpolate(&persona.goal),
            backstory: input.interpolate(&persona.backstory),
            instructions: instructions(stage, input),
            context,
        };

        let output = self.generator.generate(&request).await?;
        let output = output.trim();
        if output.is_empty() {
            return Err(StageFailure::EmptyOutput);
        }
        Ok((output.to_string(), tool_calls))
    }
}

fn instructions(stage: &Stage, input: &WorkflowInput) -> String {
    let mut text = input.interpolate(stage.description());
    if !stage.expected_output().is_empty() {
        text.push_str("\n\nExpected output: ");
        text.push_str(&input.interpolate(stage.expected_output()));
    }
    text
}
