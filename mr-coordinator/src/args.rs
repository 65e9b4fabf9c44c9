use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input files, one map task each. An empty list runs only the reduce
    /// tasks.
    pub files: Vec<String>,

    /// Number of reduce tasks.
    #[arg(short, long, default_value = "10")]
    pub n_reduce: u32,

    /// Seconds a task may run before it is handed to another worker.
    #[arg(short, long, default_value = "10")]
    pub task_timeout_secs: u64,

    /// Milliseconds between re-scans while no task is available.
    #[arg(short, long, default_value = "1000")]
    pub backoff_ms: u64,

    /// Milliseconds between checks for job completion.
    #[arg(long, default_value = "1000")]
    pub poll_ms: u64,

    /// Unix socket to listen on. Derived from the user name by default.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Shared directory for intermediate and result files.
    #[arg(short, long, default_value = ".")]
    pub work_dir: PathBuf,
}

impl Args {
    /// Input files as absolute paths, so workers may run from another
    /// directory. Files that cannot be resolved are passed through as given.
    pub fn input_files(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|file| match std::fs::canonicalize(file) {
                Ok(path) => path.display().to_string(),
                Err(e) => {
                    warn!("Cannot resolve input file {}: {}", file, e);
                    file.clone()
                }
            })
            .collect()
    }
}
