use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Unix socket of the coordinator. Derived from the user name by default.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Name of the workload to run.
    #[arg(short = 'l', long, default_value = "wc")]
    pub workload: String,

    /// Shared directory for intermediate and result files.
    #[arg(short, long, default_value = ".")]
    pub work_dir: PathBuf,

    /// Auxiliary arguments to pass to the MapReduce application.
    #[clap(value_parser, last = true)]
    pub aux: Vec<String>,
}
