use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{info, warn};

pub use common::coordinator::coordinator_client::CoordinatorClient;
use common::coordinator::{
    complete_task_request::Report, get_task_response::Task, CompleteTaskRequest, DoneRequest,
    GetTaskRequest,
};
use common::Workload;

use crate::{map, reduce};

/// Settings shared by every task a worker runs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Shared directory holding intermediate and result files.
    pub work_dir: PathBuf,

    /// Auxiliary arguments passed to the map and reduce functions.
    pub aux: Bytes,
}

impl WorkerConfig {
    pub fn new(work_dir: impl Into<PathBuf>, aux: Bytes) -> Self {
        Self {
            work_dir: work_dir.into(),
            aux,
        }
    }
}

/// Where a worker gets tasks from and reports them to.
#[tonic::async_trait]
pub trait TaskSource: Send {
    /// Ask for the next task. An error means the coordinator is gone.
    async fn get_task(&mut self) -> Result<Task>;

    /// Report a finished task. Returns whether the report was the one that
    /// completed it.
    async fn complete_task(&mut self, report: Report) -> Result<bool>;
}

/// [`TaskSource`] backed by the coordinator's gRPC service.
#[derive(Debug, Clone)]
pub struct GrpcTaskSource {
    client: CoordinatorClient<Channel>,
}

impl GrpcTaskSource {
    /// Connect to the coordinator listening on the Unix socket `socket`.
    pub async fn connect(socket: &Path) -> Result<Self> {
        let socket = socket.to_path_buf();
        // The URI is required by the endpoint but never dialled.
        let channel = Endpoint::try_from("http://[::]:50051")?
            .connect_with_connector(service_fn(move |_: Uri| UnixStream::connect(socket.clone())))
            .await?;

        Ok(Self {
            client: CoordinatorClient::new(channel),
        })
    }

    /// Whether the coordinator considers the job finished.
    pub async fn done(&mut self) -> Result<bool> {
        let response = self.client.done(DoneRequest {}).await?;
        Ok(response.into_inner().done)
    }
}

#[tonic::async_trait]
impl TaskSource for GrpcTaskSource {
    async fn get_task(&mut self) -> Result<Task> {
        let response = self.client.get_task(GetTaskRequest {}).await?;
        response
            .into_inner()
            .task
            .ok_or_else(|| anyhow!("coordinator replied without a task"))
    }

    async fn complete_task(&mut self, report: Report) -> Result<bool> {
        let request = CompleteTaskRequest {
            report: Some(report),
        };
        let response = self.client.complete_task(request).await?;
        Ok(response.into_inner().accepted)
    }
}

/// Poll `source` for tasks and run them until the job is finished or the
/// coordinator can no longer be reached.
///
/// A failing task is fatal to the worker; the coordinator hands the task to
/// someone else once it times out.
pub async fn run<S: TaskSource>(
    source: &mut S,
    workload: Workload,
    config: &WorkerConfig,
) -> Result<()> {
    loop {
        let task = match source.get_task().await {
            Ok(task) => task,
            Err(e) => {
                info!("Coordinator unreachable, stopping: {e:#}");
                return Ok(());
            }
        };

        let config = config.clone();
        let report = match task {
            Task::Map(task) => {
                let index = task.index;
                let report =
                    tokio::task::spawn_blocking(move || map::perform_map(task, workload, &config))
                        .await?
                        .with_context(|| format!("map task {index} failed"))?;
                Report::Map(report)
            }
            Task::Reduce(task) => {
                let index = task.index;
                let report = tokio::task::spawn_blocking(move || {
                    reduce::perform_reduce(task, workload, &config)
                })
                .await?
                .with_context(|| format!("reduce task {index} failed"))?;
                Report::Reduce(report)
            }
            Task::Exit(_) => {
                info!("Job finished, stopping");
                return Ok(());
            }
        };

        match source.complete_task(report).await {
            Ok(true) => {}
            Ok(false) => info!("Task had already been completed by another worker"),
            Err(e) => warn!("Failed to report task completion: {e:#}"),
        }
    }
}
