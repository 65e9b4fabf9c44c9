use anyhow::{anyhow, Context};
use bytes::Bytes;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod args;
use args::Args;

use common::endpoint;
use mr_worker::{run, GrpcTaskSource, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let workload = workload::try_named(&args.workload).ok_or_else(|| {
        anyhow!(
            "The workload `{}` is not a known workload (expected one of {:?})",
            args.workload,
            workload::NAMES
        )
    })?;

    let work_dir = std::fs::canonicalize(&args.work_dir)
        .with_context(|| format!("cannot open work dir {}", args.work_dir.display()))?;
    let config = WorkerConfig::new(work_dir, Bytes::from(args.aux.join(" ")));

    let socket = args.socket.unwrap_or_else(endpoint::coordinator_socket);
    let mut source = match GrpcTaskSource::connect(&socket).await {
        Ok(source) => source,
        Err(e) => {
            info!("No coordinator at {} ({e:#}), nothing to do", socket.display());
            return Ok(());
        }
    };
    info!("Worker connected to {}", socket.display());

    if let Err(e) = run(&mut source, workload, &config).await {
        error!("Worker failed: {e:#}");
        return Err(e);
    }
    Ok(())
}
