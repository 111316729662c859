//! One request in, tailored resume and interview materials out.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::definition::{
    PREPARE_INTERVIEW, TAILOR_RESUME, job_application_workflow,
};
use crate::config::{ConfigError, Settings};
use crate::convert::docx_to_markdown;
use crate::core::error::{DefinitionError, WorkflowError};
use crate::core::executor::{Executor, RunOutcome};
use crate::core::input::{ValidationError, WorkflowInput};
use crate::core::telemetry::LogTelemetry;
use crate::core::workflow::Workflow;
use crate::tools::ToolboxBuilder;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("could not stage the converted resume: {0}")]
    Staging(#[source] std::io::Error),

    #[error("stage '{0}' produced no output")]
    MissingOutput(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// An uploaded resume, before conversion.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationRequest {
    pub job_posting_url: String,
    pub github_url: Option<String>,
    pub personal_writeup: String,
    pub resume: Option<ResumeUpload>,
}

/// Everything one request produced.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationMaterials {
    pub run_id: Uuid,
    pub tailored_resume: String,
    pub interview_materials: String,
    /// The resume as converted, when one was uploaded and converted.
    pub resume_markdown: Option<String>,
    /// Degradations that did not stop the run.
    pub warnings: Vec<String>,
    pub outcome: RunOutcome,
}

impl ApplicationMaterials {
    /// Finalized artifact paths, tailored resume first.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.outcome.artifacts().map(Path::to_path_buf).collect()
    }
}

/// Validates input, converts and stages the resume, binds tools and runs the
/// workflow. Holds no per-request state, so one instance serves every request.
pub struct JobAssistant {
    workflow: Workflow,
    executor: Executor,
    tools: ToolboxBuilder,
}

impl JobAssistant {
    pub fn new(workflow: Workflow, executor: Executor, tools: ToolboxBuilder) -> Self {
        Self {
            workflow,
            executor,
            tools,
        }
    }

    /// Wires the configured provider, tools and output directory together.
    pub fn from_settings(settings: &Settings) -> Result<Self, ApplicationError> {
        let http = settings.http_client()?;
        let (generator, embedder) = settings.models(http.clone())?;
        let executor = Executor::new(generator, &settings.output_dir)
            .with_stage_timeout(settings.stage_timeout)
            .with_telemetry(Arc::new(LogTelemetry));
        Ok(Self::new(
            job_application_workflow()?,
            executor,
            settings.toolbox(http, embedder),
        ))
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub async fn prepare(
        &self,
        request: ApplicationRequest,
    ) -> Result<ApplicationMaterials, ApplicationError> {
        self.prepare_until_cancelled(request, &CancellationToken::new())
            .await
    }

    pub async fn prepare_until_cancelled(
        &self,
        request: ApplicationRequest,
        cancel: &CancellationToken,
    ) -> Result<ApplicationMaterials, ApplicationError> {
        let input = WorkflowInput::new(
            request.job_posting_url,
            request.github_url,
            request.personal_writeup,
        )?;

        let mut warnings = Vec::new();
        let resume_markdown = request.resume.and_then(|upload| {
            match docx_to_markdown(&upload.bytes) {
                Ok(markdown) => Some(markdown),
                Err(e) => {
                    log::warn!("Resume '{}' could not be converted: {}", upload.file_name, e);
                    warnings.push(format!(
                        "Resume '{}' could not be converted ({}); proceeding without resume analysis.",
                        upload.file_name, e
                    ));
                    None
                }
            }
        });

        // Lives until the run ends; removed on drop.
        let staged = resume_markdown.as_deref().map(stage_resume).transpose()?;

        let resolution = self
            .tools
            .resolve(staged.as_ref().map(NamedTempFile::path))
            .await;
        warnings.extend(resolution.unavailable.iter().map(ToString::to_string));

        let outcome = self
            .executor
            .run_until_cancelled(&self.workflow, &input, &resolution.toolbox, cancel)
            .await?;

        let tailored_resume = outcome
            .output(TAILOR_RESUME)
            .ok_or(ApplicationError::MissingOutput(TAILOR_RESUME))?
            .to_string();
        let interview_materials = outcome
            .output(PREPARE_INTERVIEW)
            .ok_or(ApplicationError::MissingOutput(PREPARE_INTERVIEW))?
            .to_string();

        Ok(ApplicationMaterials {
            run_id: outcome.run_id,
            tailored_resume,
            interview_materials,
            resume_markdown,
            warnings,
            outcome,
        })
    }
}

fn stage_resume(markdown: &str) -> Result<NamedTempFile, ApplicationError> {
    let mut file = tempfile::Builder::new()
        .prefix("resume-")
        .suffix(".md")
        .tempfile()
        .map_err(ApplicationError::Staging)?;
    file.write_all(markdown.as_bytes())
        .and_then(|_| file.flush())
        .map_err(ApplicationError::Staging)?;
    log::debug!("Staged converted resume at {}", file.path().display());
    Ok(file)
}
