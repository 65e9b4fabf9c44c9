//! MapReduce worker: asks the coordinator for tasks, runs the user's map or
//! reduce function and stages the output for the coordinator to publish.

pub mod core;
pub mod map;
pub mod reduce;
pub mod staging;

pub use crate::core::{run, GrpcTaskSource, TaskSource, WorkerConfig};
