use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use mr_coordinator::{serve, Scheduler, SchedulerConfig};
use mr_worker::GrpcTaskSource;

/// A coordinator serving one job on a socket inside its own temp dir.
pub struct Cluster {
    pub dir: TempDir,
    pub socket: PathBuf,
    pub scheduler: Scheduler,
    stop: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl Cluster {
    /// Write `inputs` as files in the work dir and start a coordinator over
    /// them.
    pub async fn start(inputs: &[&str], n_reduce: u32, task_timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let files = inputs
            .iter()
            .enumerate()
            .map(|(i, body)| {
                let path = dir.path().join(format!("input-{i}.txt"));
                std::fs::write(&path, body).unwrap();
                path.display().to_string()
            })
            .collect();

        let config = SchedulerConfig {
            n_reduce,
            task_timeout,
            backoff: Duration::from_millis(50),
            work_dir: dir.path().to_path_buf(),
        };
        let scheduler = Scheduler::new(files, config).unwrap();
        let socket = dir.path().join("coordinator.sock");

        let (stop, stopped) = oneshot::channel::<()>();
        let server = {
            let scheduler = scheduler.clone();
            let socket = socket.clone();
            tokio::spawn(async move {
                serve(scheduler, &socket, async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
            })
        };

        Self {
            dir,
            socket,
            scheduler,
            stop: Some(stop),
            server,
        }
    }

    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Connect a task source, retrying while the server comes up.
    pub async fn connect(&self) -> GrpcTaskSource {
        for _ in 0..100 {
            if let Ok(source) = GrpcTaskSource::connect(&self.socket).await {
                return source;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("coordinator never came up at {}", self.socket.display());
    }

    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.server.await.unwrap();
    }

    /// Names of the files in the work dir that start with `.`.
    pub fn hidden_files(&self) -> Vec<String> {
        std::fs::read_dir(self.work_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('.'))
            .collect()
    }
}
