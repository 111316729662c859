//! End-to-end runs of the job-application workflow against a scripted
//! provider and counting tools.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use jobsmith::application::{
    ApplicationError, ApplicationRequest, BUILD_PROFILE, EXTRACT_REQUIREMENTS,
    INTERVIEW_MATERIALS_FILE, PREPARE_INTERVIEW, ResumeUpload, TAILOR_RESUME,
    TAILORED_RESUME_FILE,
};
use jobsmith::core::{StageFailure, ValidationError, WorkflowError};
use jobsmith::llm::ContextKind;
use jobsmith::tools::{MarkdownSearch, ToolError, ToolboxBuilder};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn request(resume: Option<Vec<u8>>) -> ApplicationRequest {
    ApplicationRequest {
        job_posting_url: "https://example.com/job/123".to_string(),
        github_url: Some("https://github.com/jane".to_string()),
        personal_writeup: "Backend engineer who enjoys distributed systems.".to_string(),
        resume: resume.map(|bytes| ResumeUpload {
            file_name: "resume.docx".to_string(),
            bytes,
        }),
    }
}

#[tokio::test]
async fn test_full_run_with_resume() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();
    let assistant = assistant(generator.clone(), out.path(), &tools);

    let materials = assistant.prepare(request(Some(resume_docx()))).await.unwrap();

    assert_eq!(materials.tailored_resume, format!("output of {}", STRATEGIST));
    assert_eq!(materials.interview_materials, format!("output of {}", PREPARER));
    assert!(materials.warnings.is_empty(), "{:?}", materials.warnings);

    let resume = materials.resume_markdown.as_deref().unwrap();
    assert!(resume.contains("Jane Doe"));
    assert!(resume.contains("**8 years**"));
    assert!(resume.contains("- Built a payments ledger"));

    // Both finalized files live in the run's own directory.
    let run_dir = out.path().join(materials.run_id.to_string());
    let tailored = run_dir.join(TAILORED_RESUME_FILE);
    let interview = run_dir.join(INTERVIEW_MATERIALS_FILE);
    assert_eq!(materials.artifacts(), vec![tailored.clone(), interview.clone()]);
    assert_eq!(
        std::fs::read_to_string(&tailored).unwrap(),
        materials.tailored_resume
    );
    assert_eq!(
        std::fs::read_to_string(&interview).unwrap(),
        materials.interview_materials
    );
    assert_eq!(files_under(out.path()).len(), 2);

    // The resume was indexed once and read by the stages that declare it.
    assert_eq!(tools.semantic.indexed.load(Ordering::SeqCst), 1);
    assert_eq!(tools.file_read.calls.load(Ordering::SeqCst), 2);
    assert_eq!(tools.semantic.searches.load(Ordering::SeqCst), 3);

    let tailor = generator.request_for(STRATEGIST).unwrap();
    let read = tailor
        .context
        .iter()
        .find(|block| block.label == "file-read: resume")
        .unwrap();
    assert!(read.body.contains("Jane Doe"));
    assert!(tailor.context_labels(ContextKind::Notice).is_empty());
}

#[tokio::test]
async fn test_stages_see_exactly_their_upstream_outputs() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();
    assistant(generator.clone(), out.path(), &tools)
        .prepare(request(None))
        .await
        .unwrap();

    let extract = generator.request_for(RESEARCHER).unwrap();
    let profile = generator.request_for(PROFILER).unwrap();
    let tailor = generator.request_for(STRATEGIST).unwrap();
    let interview = generator.request_for(PREPARER).unwrap();

    assert!(extract.context_labels(ContextKind::Stage).is_empty());
    assert!(profile.context_labels(ContextKind::Stage).is_empty());
    assert_eq!(
        tailor.context_labels(ContextKind::Stage),
        vec![EXTRACT_REQUIREMENTS, BUILD_PROFILE]
    );
    assert_eq!(
        interview.context_labels(ContextKind::Stage),
        vec![EXTRACT_REQUIREMENTS, BUILD_PROFILE, TAILOR_RESUME]
    );

    // Upstream outputs arrive trimmed.
    let requirements = tailor
        .context
        .iter()
        .find(|block| block.label == EXTRACT_REQUIREMENTS)
        .unwrap();
    assert_eq!(requirements.body, format!("output of {}", RESEARCHER));

    // Inputs are interpolated into the instructions.
    assert!(extract.instructions.contains("https://example.com/job/123"));
    assert!(profile.instructions.contains("https://github.com/jane"));
    assert!(!profile.instructions.contains("{personal_writeup}"));
}

#[tokio::test]
async fn test_result_does_not_depend_on_completion_order() {
    let slow = Duration::from_millis(80);
    let mut contexts = Vec::new();
    let mut documents = Vec::new();

    for generator in [
        ScriptedGenerator::new().with_delay(RESEARCHER, slow),
        ScriptedGenerator::new().with_delay(PROFILER, slow),
    ] {
        let out = TempDir::new().unwrap();
        let generator = Arc::new(generator);
        let materials = assistant(generator.clone(), out.path(), &Tools::default())
            .prepare(request(None))
            .await
            .unwrap();

        contexts.push(generator.request_for(STRATEGIST).unwrap().context);
        documents.push((materials.tailored_resume, materials.interview_materials));
    }

    assert_eq!(contexts[0], contexts[1]);
    assert_eq!(documents[0], documents[1]);
}

#[tokio::test]
async fn test_independent_stages_run_concurrently() {
    let out = TempDir::new().unwrap();
    let delay = Duration::from_millis(300);
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_delay(RESEARCHER, delay)
            .with_delay(PROFILER, delay),
    );

    let started = std::time::Instant::now();
    assistant(generator, out.path(), &Tools::default())
        .prepare(request(None))
        .await
        .unwrap();

    // Sequential execution would take at least twice the delay.
    assert!(started.elapsed() < delay * 2, "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_no_resume_skips_document_tools() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();
    let mut req = request(None);
    req.github_url = None;

    let materials = assistant(generator.clone(), out.path(), &tools)
        .prepare(req)
        .await
        .unwrap();

    assert_eq!(tools.file_read.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tools.semantic.indexed.load(Ordering::SeqCst), 0);
    assert_eq!(tools.semantic.searches.load(Ordering::SeqCst), 0);
    assert!(materials.resume_markdown.is_none());
    assert_eq!(materials.artifacts().len(), 2);

    // The missing GitHub URL skips the profile's web requests.
    assert_eq!(
        *tools.scrape.urls.lock().unwrap(),
        vec!["https://example.com/job/123".to_string()]
    );
    assert_eq!(
        *tools.search.queries.lock().unwrap(),
        vec!["https://example.com/job/123 job requirements qualifications".to_string()]
    );

    // Stages that wanted the resume are told it is missing; the researcher is not.
    for role in [PROFILER, STRATEGIST, PREPARER] {
        let req = generator.request_for(role).unwrap();
        assert_eq!(req.context_labels(ContextKind::Notice).len(), 1, "{}", role);
    }
    let extract = generator.request_for(RESEARCHER).unwrap();
    assert!(extract.context_labels(ContextKind::Notice).is_empty());

    assert!(materials.warnings.iter().any(|w| w.contains("no resume was provided")));
}

#[tokio::test]
async fn test_unreadable_resume_degrades_to_no_resume() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();

    let materials = assistant(generator.clone(), out.path(), &tools)
        .prepare(request(Some(b"definitely not a zip".to_vec())))
        .await
        .unwrap();

    assert!(materials.resume_markdown.is_none());
    assert!(
        materials
            .warnings
            .iter()
            .any(|w| w.contains("proceeding without resume analysis"))
    );
    assert_eq!(tools.file_read.calls.load(Ordering::SeqCst), 0);
    assert_eq!(materials.artifacts().len(), 2);
}

#[tokio::test]
async fn test_provider_failure_names_stage_and_finalizes_nothing() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new().failing_on(PROFILER));

    let err = assistant(generator.clone(), out.path(), &Tools::default())
        .prepare(request(Some(resume_docx())))
        .await
        .unwrap_err();

    match &err {
        ApplicationError::Workflow(e @ WorkflowError::Stage { stage, .. }) => {
            assert_eq!(stage, BUILD_PROFILE);
            assert_eq!(e.stage(), Some(BUILD_PROFILE));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains(BUILD_PROFILE));
    assert!(message.contains("quota exceeded"));

    // Downstream stages never ran and no file was left behind.
    assert!(generator.request_for(STRATEGIST).is_none());
    assert!(generator.request_for(PREPARER).is_none());
    assert!(files_under(out.path()).is_empty());
}

#[tokio::test]
async fn test_tool_failure_names_stage_and_finalizes_nothing() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools {
        scrape: Arc::new(CountingScrape::failing_on("https://github.com/jane")),
        ..Tools::default()
    };

    let err = assistant(generator.clone(), out.path(), &tools)
        .prepare(request(Some(resume_docx())))
        .await
        .unwrap_err();

    match &err {
        ApplicationError::Workflow(WorkflowError::Stage {
            stage,
            cause: StageFailure::Tool(ToolError::Status { status: 503, .. }),
        }) => assert_eq!(stage, BUILD_PROFILE),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("upstream unavailable"));

    // The profiler never got to generate, and nothing downstream ran.
    assert!(generator.request_for(PROFILER).is_none());
    assert!(generator.request_for(STRATEGIST).is_none());
    assert!(generator.request_for(PREPARER).is_none());
    assert!(files_under(out.path()).is_empty());
}

#[tokio::test]
async fn test_cancel_after_tailored_resume_is_staged_finalizes_nothing() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new().with_delay(PREPARER, Duration::from_secs(30)));
    let assistant = assistant(generator.clone(), out.path(), &Tools::default());
    let cancel = CancellationToken::new();

    let watcher = async {
        tokio::time::timeout(Duration::from_secs(10), async {
            while generator.request_for(PREPARER).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // The tailored resume is staged but not yet in place.
        let staged = files_under(out.path());
        assert_eq!(staged.len(), 1);
        let name = staged[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!(".{}.", TAILORED_RESUME_FILE)), "{name}");
        cancel.cancel();
    };

    let (result, ()) = tokio::join!(
        assistant.prepare_until_cancelled(request(Some(resume_docx())), &cancel),
        watcher
    );

    assert!(matches!(
        result,
        Err(ApplicationError::Workflow(WorkflowError::Cancelled))
    ));
    assert!(files_under(out.path()).is_empty());
    assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_resume_index_is_released_after_each_run() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new().failing_on(PREPARER));
    let search = Arc::new(MarkdownSearch::new(Arc::new(UnitEmbedder)));
    let assistant = assistant_with(
        generator,
        out.path(),
        ToolboxBuilder::new().with_semantic_search(search.clone()),
    );

    for _ in 0..3 {
        assert!(assistant.prepare(request(Some(resume_docx()))).await.is_err());
        assert_eq!(search.indexed_documents(), 0);
    }

    let ok = assistant_with(
        Arc::new(ScriptedGenerator::new()),
        out.path(),
        ToolboxBuilder::new().with_semantic_search(search.clone()),
    );
    let materials = ok.prepare(request(Some(resume_docx()))).await.unwrap();
    assert!(materials.warnings.iter().all(|w| !w.contains("semantic")), "{:?}", materials.warnings);
    assert_eq!(search.indexed_documents(), 0);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_any_work() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();
    let assistant = assistant(generator.clone(), out.path(), &tools);

    let mut missing = request(None);
    missing.job_posting_url = "   ".to_string();
    let err = assistant.prepare(missing).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Validation(ValidationError::MissingField("job_posting_url"))
    ));

    let mut bad_url = request(None);
    bad_url.github_url = Some("github.com/jane".to_string());
    let err = assistant.prepare(bad_url).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Validation(ValidationError::InvalidUrl { .. })
    ));

    assert!(generator.requests().is_empty());
    assert!(tools.scrape.urls.lock().unwrap().is_empty());
    assert!(files_under(out.path()).is_empty());
}

#[tokio::test]
async fn test_runs_do_not_share_state() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();
    let assistant = assistant(generator, out.path(), &tools);

    let (first, second) = tokio::join!(
        assistant.prepare(request(None)),
        assistant.prepare(request(Some(resume_docx())))
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_ne!(first.run_id, second.run_id);
    assert!(first.resume_markdown.is_none());
    assert!(second.resume_markdown.is_some());
    assert_eq!(files_under(out.path()).len(), 4);
    assert_eq!(first.outcome.output(PREPARE_INTERVIEW), Some(first.interview_materials.as_str()));
}

#[tokio::test]
async fn test_example_scenario_without_resume_or_github() {
    let out = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new());
    let tools = Tools::default();

    let materials = assistant(generator.clone(), out.path(), &tools)
        .prepare(ApplicationRequest {
            job_posting_url: "https://example.com/job/123".to_string(),
            github_url: Some(String::new()),
            personal_writeup: "5 years backend engineer".to_string(),
            resume: None,
        })
        .await
        .unwrap();

    assert!(!materials.tailored_resume.trim().is_empty());
    assert!(!materials.interview_materials.trim().is_empty());
    assert_eq!(materials.outcome.outputs().count(), 4);

    // Only the posting and the write-up reach the model.
    let profile = generator.request_for(PROFILER).unwrap();
    assert!(profile.instructions.contains("5 years backend engineer"));
    assert!(profile.instructions.contains("not provided"));
    let tool_labels: Vec<String> = generator
        .requests()
        .into_iter()
        .flat_map(|r| r.context)
        .filter(|b| b.kind == ContextKind::Tool)
        .map(|b| b.label)
        .collect();
    assert_eq!(tool_labels.len(), 2);
    assert!(tool_labels.iter().all(|label| label.contains("https://example.com/job/123")));

    assert_eq!(tools.file_read.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tools.semantic.searches.load(Ordering::SeqCst), 0);
}
