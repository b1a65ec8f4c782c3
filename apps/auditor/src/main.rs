use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{AuditRunOutcome, HttpAuditClient, SelectedFile, WorkflowController, WorkflowState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

#[derive(Parser, Debug)]
#[command(name = "auditor", about = "Submit an R&D project document for a compliance audit")]
struct Args {
    /// Document to audit, usually a PDF.
    file: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    system_prompt: Option<String>,
    /// Settings file; defaults to ./auditor.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Probe GET /health before uploading.
    #[arg(long)]
    check_health: bool,
    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

async fn read_selected_file(path: &Path) -> Result<SelectedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;

    let file = SelectedFile::new(filename, bytes);
    Ok(match mime_type_for(path) {
        Some(mime_type) => file.with_mime_type(mime_type),
        None => file,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(v) = args.server_url {
        settings.server_url = v;
    }
    if let Some(v) = args.query {
        settings.query = v;
    }
    if let Some(v) = args.system_prompt {
        settings.system_prompt = Some(v);
    }
    let server_url = settings.validated_server_url()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let client = Arc::new(HttpAuditClient::with_http_client(server_url, http));

    if args.check_health {
        let health = client
            .health()
            .await
            .with_context(|| format!("audit service at {} is unreachable", client.server_url()))?;
        if health.is_ready() {
            info!(server_url = %client.server_url(), "audit service ready");
        } else {
            warn!(
                status = %health.status,
                llm = health.llm,
                vector_store = health.vector_store,
                "audit service reports missing backends; audit may fail"
            );
        }
    }

    let file = read_selected_file(&args.file).await?;
    let controller = WorkflowController::new(client);

    let mut states = controller.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(state) = states.recv().await {
            if let Some(line) = render::progress_line(&state) {
                eprintln!("{line}");
            }
        }
    });

    controller.select_file(file).await;
    let outcome = controller.start_audit(settings.audit_request()).await;
    let state = controller.current_state().await;
    // Dropping the controller closes the state channel so the progress task finishes.
    drop(controller);
    let _ = progress.await;

    info!(?outcome, phase = state.phase(), "audit finished");
    match (outcome, state) {
        (AuditRunOutcome::Succeeded, WorkflowState::Success { report, .. }) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::report_text(&report));
            }
            Ok(ExitCode::SUCCESS)
        }
        (_, WorkflowState::Error { message, .. }) => {
            eprintln!("Error: {message}");
            Ok(ExitCode::FAILURE)
        }
        (outcome, state) => {
            eprintln!(
                "Audit did not complete (outcome {outcome:?}, state {})",
                state.phase()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
