//! Upload simulator entry point.

mod config;
mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chunkload_protocol::{MutationTarget, UploadStatus};
use chunkload_uploader::{UploadEvent, UploadOutcome, UploadRequest, Uploader, scan_files_for_upload};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::SimConfig;
use crate::remote::SimulatedRemote;

#[derive(Parser)]
#[command(name = "upload-sim")]
#[command(about = "Upload a local directory to a simulated remote", long_about = None)]
#[command(version)]
struct Args {
    /// Directory to upload
    directory: PathBuf,

    /// Simulator configuration file (defaults to ./upload-sim.toml if present)
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let root = args.directory;
    let config = SimConfig::load(args.config.as_deref())?;
    tracing::info!(
        root = %root.display(),
        chunk_size = config.uploader.chunk_size,
        max_concurrency = config.uploader.max_concurrency,
        failure_rate = config.simulation.failure_rate,
        "starting upload simulation"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(run(root, config))?;

    tracing::info!(
        transaction = %outcome.transaction_id,
        status = ?outcome.status,
        uploaded_chunks = outcome.uploaded_chunks,
        total_chunks = outcome.total_chunks,
        uploaded_bytes = outcome.uploaded_bytes,
        files_created = outcome.nodes.len(),
        "simulation finished"
    );

    outcome.ensure_committed()?;
    if outcome.status == UploadStatus::CompletedWithFailures {
        anyhow::bail!(outcome.failure_message.unwrap_or_default());
    }
    Ok(())
}

async fn run(root: PathBuf, config: SimConfig) -> anyhow::Result<UploadOutcome> {
    let files = scan_files_for_upload(&root)
        .with_context(|| format!("scanning {}", root.display()))?;
    anyhow::ensure!(!files.is_empty(), "{} contains no files", root.display());

    let sim = &config.simulation;
    let target = MutationTarget::new(&sim.owner, &sim.name, &sim.connection);
    let request = UploadRequest::new(files, sim.destination.clone(), target);
    let remote = Arc::new(SimulatedRemote::new(config.simulation.clone()));

    let mut uploader = Uploader::new(request, remote.clone(), config.uploader)?;
    let mut events = uploader.take_events().context("event channel already taken")?;

    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                UploadEvent::Progress(update) => tracing::info!("{}", update.message),
                UploadEvent::NodeCreated { node, .. } => {
                    tracing::info!(file = %node.key, bytes = node.size, "file created")
                }
                UploadEvent::StateChanged(state) => tracing::debug!(%state, "state changed"),
                UploadEvent::Failed { message, .. } => tracing::warn!("{message}"),
                UploadEvent::FinalizeFailed { message } => {
                    tracing::error!(error = %message, "finalize failed")
                }
            }
        }
    });

    let handle = uploader.start_upload(|result| {
        if let Err(e) = result {
            tracing::error!(error = %e, "upload aborted");
        }
    });

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let outcome = handle.wait().await?;
    let _ = reporter.await;
    tracing::info!(
        committed = ?remote.committed(),
        "remote transactions committed"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_take_directory_and_optional_config() {
        let args = Args::try_parse_from(["upload-sim", "data"]).unwrap();
        assert_eq!(args.directory, PathBuf::from("data"));
        assert!(args.config.is_none());

        let args = Args::try_parse_from(["upload-sim", "data", "sim.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("sim.toml")));
    }

    #[test]
    fn args_require_a_directory() {
        assert!(Args::try_parse_from(["upload-sim"]).is_err());
    }
}
