use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::{
    Json,
    extract::{Multipart, State},
    response::Html,
};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::AppState;
use super::error::ApiError;
use super::render::render_markdown;
use crate::application::{ApplicationMaterials, ApplicationRequest, ResumeUpload};

const INDEX: &str = include_str!("index.html");

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX)
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": crate::NAME
    }))
}

/// A Markdown document and its display rendering.
#[derive(Debug, Serialize)]
pub struct RenderedDocument {
    pub markdown: String,
    pub html: String,
}

impl RenderedDocument {
    fn new(markdown: String) -> Self {
        let html = render_markdown(&markdown);
        Self { markdown, html }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub run_id: Uuid,
    pub tailored_resume: RenderedDocument,
    pub interview_materials: RenderedDocument,
    pub resume_markdown: Option<String>,
    pub stages: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub artifacts: Vec<PathBuf>,
}

impl From<ApplicationMaterials> for GenerateResponse {
    fn from(materials: ApplicationMaterials) -> Self {
        let artifacts = materials.artifacts();
        let stages = materials
            .outcome
            .outputs()
            .map(|(name, output)| (name.to_string(), output.to_string()))
            .collect();
        Self {
            run_id: materials.run_id,
            tailored_resume: RenderedDocument::new(materials.tailored_resume),
            interview_materials: RenderedDocument::new(materials.interview_materials),
            resume_markdown: materials.resume_markdown,
            stages,
            warnings: materials.warnings,
            artifacts,
        }
    }
}

/// Reads the form, runs the workflow and returns both documents.
///
/// The run is tied to the server's shutdown token, and to the request
/// itself: a client that disconnects drops the run along with its
/// unfinished artifacts.
pub async fn generate_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut request = ApplicationRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "job_posting_url" => request.job_posting_url = field.text().await?,
            "github_url" => request.github_url = Some(field.text().await?),
            "personal_writeup" => request.personal_writeup = field.text().await?,
            "resume" => {
                let file_name = field.file_name().unwrap_or("resume.docx").to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    request.resume = Some(ResumeUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => log::debug!("Ignoring form field '{}'", other),
        }
    }

    log::info!(
        "Generating materials for {} (resume: {})",
        request.job_posting_url.trim(),
        request.resume.is_some()
    );

    let cancel = state.shutdown.child_token();
    let materials = state
        .assistant
        .prepare_until_cancelled(request, &cancel)
        .await?;

    Ok(Json(materials.into()))
}
