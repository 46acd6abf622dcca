//! Upload orchestration: wires the HTTP endpoint, the engine and Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use folio_http::HttpEndpoint;
use folio_protocol::{FileMeta, ResumeToken};
use folio_transfer::FileHandle;
use folio_uploader::{UploadEvent, UploadHandle, Uploader};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::resume_state::{ResumeState, state_path};

/// What to upload.
#[derive(Debug, Clone)]
pub struct Job {
    pub file: PathBuf,
    pub mime: Option<String>,
    /// Resume state file from an earlier interrupted run.
    pub resume: Option<PathBuf>,
}

/// Runs one upload until it completes, fails or is interrupted.
pub async fn run(job: Job, config: Config) -> anyhow::Result<()> {
    let endpoint = HttpEndpoint::new(
        &config.endpoint.base_url,
        config.endpoint.api_key.as_deref(),
        Duration::from_secs(config.endpoint.timeout_secs),
    )?;
    let uploader = Uploader::new(Arc::new(endpoint), config.upload.clone())?;
    let file = FileHandle::from_path(&job.file)
        .with_context(|| format!("opening {}", job.file.display()))?;
    let resume_path = resume_state_path(&job);

    let mut handle = match &job.resume {
        Some(path) => {
            let state = ResumeState::load(path)
                .with_context(|| format!("reading resume state {}", path.display()))?;
            let token = ResumeToken::decode(&state.token)?;
            let handle = uploader
                .from_resume_token(file, &token, &state.uploaded_chunks)
                .await?;
            handle.resume().await?;
            handle
        }
        None => {
            let meta = FileMeta::new(file_name(&job.file)?, mime_for(&job));
            tracing::info!(
                file = %job.file.display(),
                mime = %meta.mime_type,
                size = file.size(),
                "starting upload"
            );
            uploader.start(file, meta).await?
        }
    };

    let events = handle
        .take_events()
        .context("upload events already taken")?;
    let reporter = tokio::spawn(log_events(events));

    let outcome = drive(handle, &resume_path).await;
    match outcome {
        // The paused session is dropped with its handle; skip its last events.
        Ok(Drive::Paused) => reporter.abort(),
        _ => {
            let _ = reporter.await;
        }
    }
    outcome.map(|_| ())
}

enum Drive {
    Finished,
    Paused,
}

/// Waits for the session, pausing and saving resume state on Ctrl-C.
async fn drive(handle: UploadHandle, resume_path: &Path) -> anyhow::Result<Drive> {
    let mut watch = handle.watch();

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = watch.wait_for(|s| s.is_terminal()) => false,
    };

    if interrupted {
        tracing::info!("interrupt received, pausing upload");
        match handle.pause().await {
            Ok(()) => {
                ResumeState::from_snapshot(&handle.snapshot()).save(resume_path)?;
                tracing::info!(
                    state = %resume_path.display(),
                    "upload paused; rerun with --resume to continue"
                );
                return Ok(Drive::Paused);
            }
            // Finished while the signal was handled.
            Err(e) => tracing::debug!(error = %e, "pause rejected"),
        }
    }

    match handle.wait().await {
        Ok(result) => {
            if resume_path.exists() {
                std::fs::remove_file(resume_path)?;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(Drive::Finished)
        }
        Err(e) => {
            let snapshot = watch.borrow().clone();
            ResumeState::from_snapshot(&snapshot).save(resume_path)?;
            tracing::info!(state = %resume_path.display(), "resume state saved");
            Err(e.into())
        }
    }
}

async fn log_events(mut events: mpsc::UnboundedReceiver<UploadEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Progress(p) => tracing::info!(
                percent = (p.percentage * 10.0).round() / 10.0,
                uploaded = p.uploaded_bytes,
                total = p.total_bytes,
                speed_bps = p.speed_bytes_per_sec as u64,
                eta_secs = p.remaining_seconds.ceil() as u64,
                "progress"
            ),
            UploadEvent::ChunkComplete { index, total } => {
                tracing::debug!(chunk = index, total, "chunk confirmed");
            }
            UploadEvent::Error(e) => tracing::error!(kind = %e.kind, error = %e.message, "upload error"),
            UploadEvent::Complete(r) => tracing::info!(
                file_id = %r.file_id,
                checksum = %r.checksum,
                elapsed_ms = r.upload_time_ms,
                retries = r.retry_count,
                "upload complete"
            ),
            UploadEvent::Paused => tracing::info!("upload paused"),
            UploadEvent::Resumed => tracing::info!("upload resumed"),
            UploadEvent::Cancelled => tracing::info!("upload cancelled"),
        }
    }
}

/// The state file to save to and remove: the one given with `--resume`,
/// otherwise the default next to the uploaded file.
fn resume_state_path(job: &Job) -> PathBuf {
    job.resume.clone().unwrap_or_else(|| state_path(&job.file))
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

fn mime_for(job: &Job) -> String {
    job.mime.clone().unwrap_or_else(|| {
        mime_guess::from_path(&job.file)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    })
}
