use std::future::Future;
use std::path::Path;

use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

pub use common::coordinator::coordinator_server::{Coordinator, CoordinatorServer};
use common::coordinator::{
    complete_task_request::Report, get_task_response::Task, CompleteTaskRequest,
    CompleteTaskResponse, DoneRequest, DoneResponse, Exit, GetTaskRequest, GetTaskResponse,
    MapTask, ReduceTask,
};

use crate::scheduler::{Assignment, Scheduler, TaskKind, TaskReport};

/// gRPC front of the [`Scheduler`].
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    scheduler: Scheduler,
}

impl MRCoordinator {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

impl From<Assignment> for Task {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Map {
                index,
                file_name,
                n_reduce,
            } => Task::Map(MapTask {
                index,
                file_name,
                n_reduce,
            }),
            Assignment::Reduce { index } => Task::Reduce(ReduceTask { index }),
            Assignment::Exit => Task::Exit(Exit {}),
        }
    }
}

impl TryFrom<CompleteTaskRequest> for TaskReport {
    type Error = Status;

    fn try_from(request: CompleteTaskRequest) -> Result<Self, Self::Error> {
        match request.report {
            Some(Report::Map(map)) => Ok(TaskReport {
                kind: TaskKind::Map,
                index: map.index,
                file_name: Some(map.file_name),
                staged_output: map.staged_output,
            }),
            Some(Report::Reduce(reduce)) => Ok(TaskReport {
                kind: TaskKind::Reduce,
                index: reduce.index,
                file_name: None,
                staged_output: reduce.staged_output,
            }),
            None => Err(Status::invalid_argument("completion report is empty")),
        }
    }
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    /// Blocks until there is work, or the job is finished.
    async fn get_task(
        &self,
        _request: Request<GetTaskRequest>,
    ) -> Result<Response<GetTaskResponse>, Status> {
        let assignment = self.scheduler.get_task().await;
        debug!("Handing out {:?}", assignment);

        Ok(Response::new(GetTaskResponse {
            task: Some(assignment.into()),
        }))
    }

    async fn complete_task(
        &self,
        request: Request<CompleteTaskRequest>,
    ) -> Result<Response<CompleteTaskResponse>, Status> {
        let report = TaskReport::try_from(request.into_inner())?;
        let accepted = self.scheduler.complete_task(report).await?;

        Ok(Response::new(CompleteTaskResponse { accepted }))
    }

    async fn done(&self, _request: Request<DoneRequest>) -> Result<Response<DoneResponse>, Status> {
        let done = self.scheduler.done().await;
        Ok(Response::new(DoneResponse { done }))
    }
}

/// Serve `scheduler` on the Unix socket at `socket` until `shutdown`
/// resolves. A stale socket file left by a previous run is replaced.
pub async fn serve<F>(
    scheduler: Scheduler,
    socket: &Path,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()>,
{
    match tokio::fs::remove_file(socket).await {
        Ok(()) => debug!("Removed stale socket {}", socket.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(socket)?;
    let incoming = UnixListenerStream::new(listener);
    info!("CoordinatorServer listening on {}", socket.display());

    Server::builder()
        .add_service(CoordinatorServer::new(MRCoordinator::new(scheduler)))
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await?;

    let _ = tokio::fs::remove_file(socket).await;
    Ok(())
}
