//! CLI for jobsmith: run the workflow once, serve the web form, or convert
//! a resume.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
#[cfg(feature = "server")]
use std::net::SocketAddr;
#[cfg(feature = "server")]
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use jobsmith::application::{ApplicationRequest, JobAssistant, ResumeUpload};
use jobsmith::config::Settings;
use jobsmith::convert::docx_to_markdown;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Tailor a resume to a posting
  jobsmith run --job-posting-url https://example.com/job/123 \
    --writeup-file about-me.txt --resume resume.docx

  # Serve the web form
  jobsmith serve --bind 0.0.0.0:8501

  # Convert a resume only (no API key needed)
  jobsmith convert resume.docx -o resume.md

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY               Google Gemini API key (preferred provider)
  GEMINI_MODEL_NAME            Gemini model (default: gemini-2.0-flash)
  OLLAMA_HOST                  Ollama base URL, used when no Gemini key is set
  OLLAMA_MODEL                 Ollama model (default: phi4)
  SERPER_API_KEY               Serper key; web search is disabled without it
  JOBSMITH_OUTPUT_DIR          Where runs write their documents
  JOBSMITH_STAGE_TIMEOUT_SECS  Per-stage timeout, 0 disables (default: 300)
  JOBSMITH_BIND                Server address (default: 127.0.0.1:8501)
  RUST_LOG                     Log filter (default: info)

A .env file in the working directory is loaded first.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "jobsmith",
    version,
    about = "Tailor a resume and interview notes to a job posting",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level logs.
    #[arg(short, long, global = true, env = "JOBSMITH_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the workflow once and print both documents.
    Run(RunArgs),
    /// Serve the web form and JSON API.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
    /// Convert a DOCX resume to Markdown.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    job_posting_url: String,

    #[arg(long)]
    github_url: Option<String>,

    /// Personal write-up text.
    #[arg(long, conflicts_with = "writeup_file")]
    writeup: Option<String>,

    /// Read the personal write-up from a file.
    #[arg(long)]
    writeup_file: Option<PathBuf>,

    /// DOCX resume.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Overrides JOBSMITH_OUTPUT_DIR.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Overrides JOBSMITH_BIND.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Overrides JOBSMITH_OUTPUT_DIR.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// DOCX file to convert.
    input: PathBuf,

    /// Write Markdown here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `env = ...` arguments see .env values.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => serve(args).await,
        Command::Convert(args) => convert(args),
    }
}

fn load_settings(output_dir: Option<PathBuf>) -> Result<Settings> {
    let mut settings = Settings::from_env().context("Invalid configuration")?;
    if let Some(dir) = output_dir {
        settings.output_dir = dir;
    }
    Ok(settings)
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, shutting down");
            token.cancel();
        }
    });
}

fn read_resume(path: &Path) -> Result<ResumeUpload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume.docx".to_string());
    Ok(ResumeUpload { file_name, bytes })
}

async fn run(args: RunArgs) -> Result<()> {
    let settings = load_settings(args.output_dir)?;
    let assistant = JobAssistant::from_settings(&settings)?;

    let personal_writeup = match (args.writeup, args.writeup_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => String::new(),
    };
    let resume = args.resume.as_deref().map(read_resume).transpose()?;

    let request = ApplicationRequest {
        job_posting_url: args.job_posting_url,
        github_url: args.github_url,
        personal_writeup,
        resume,
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let materials = assistant
        .prepare_until_cancelled(request, &cancel)
        .await
        .context("Run failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&materials).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    for warning in &materials.warnings {
        eprintln!("warning: {warning}");
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}\n\n---\n\n{}", materials.tailored_resume, materials.interview_materials)
        .context("Failed to write to stdout")?;
    for path in materials.artifacts() {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "server")]
async fn serve(args: ServeArgs) -> Result<()> {
    use jobsmith::server::{self, AppState};

    let mut settings = load_settings(args.output_dir)?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }

    let state = AppState {
        assistant: Arc::new(JobAssistant::from_settings(&settings)?),
        shutdown: CancellationToken::new(),
    };
    cancel_on_ctrl_c(state.shutdown.clone());

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    server::serve(listener, state).await?;
    log::info!("Server stopped");
    Ok(())
}

fn convert(args: ConvertArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let markdown = docx_to_markdown(&bytes)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            out.write_all(markdown.as_bytes())
                .and_then(|_| out.write_all(b"\n"))
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
