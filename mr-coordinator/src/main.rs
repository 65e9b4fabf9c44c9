mod args;

use std::time::Duration;

use args::Args;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::endpoint;
use mr_coordinator::{serve, Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = SchedulerConfig {
        n_reduce: args.n_reduce,
        task_timeout: Duration::from_secs(args.task_timeout_secs),
        backoff: Duration::from_millis(args.backoff_ms),
        work_dir: args.work_dir.clone(),
    };
    let files = args.input_files();
    let scheduler = Scheduler::new(files, config)?;
    let socket = args.socket.unwrap_or_else(endpoint::coordinator_socket);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            serve(scheduler, &socket, async {
                let _ = stop_rx.await;
            })
            .await
        })
    };

    let poll = Duration::from_millis(args.poll_ms);
    while !scheduler.done().await {
        if server.is_finished() {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    if scheduler.done().await {
        info!("Job done, shutting down");
    }
    let _ = stop_tx.send(());

    match server.await? {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Coordinator server failed: {}", e);
            Err(e)
        }
    }
}
