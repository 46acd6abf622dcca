//! Folio manuscript upload CLI entry point.

mod app;
mod config;
mod resume_state;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Uploads a manuscript file to a Folio journal server in resumable chunks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to upload
    file: PathBuf,

    /// Path to the configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upload API base URL
    #[arg(long)]
    endpoint: Option<String>,

    /// MIME type; guessed from the file extension when omitted
    #[arg(long)]
    mime: Option<String>,

    /// Resume state file written by an interrupted run
    #[arg(long, value_name = "STATE")]
    resume: Option<PathBuf>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Maximum concurrent chunk transfers
    #[arg(long)]
    concurrency: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.endpoint {
        config.endpoint.base_url = url;
    }
    if let Some(size) = cli.chunk_size {
        config.upload.chunk_size = size;
    }
    if let Some(n) = cli.concurrency {
        config.upload.max_concurrent_chunks = n;
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.endpoint.base_url,
        "starting folio-upload"
    );

    let job = app::Job {
        file: cli.file,
        mime: cli.mime,
        resume: cli.resume,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(job, config))
}
