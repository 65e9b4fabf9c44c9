//! MapReduce coordinator: owns the job's scheduling state and serves it to
//! workers over gRPC.

pub mod core;
pub mod error;
pub mod scheduler;

pub use crate::core::{serve, MRCoordinator};
pub use error::CoordinatorError;
pub use scheduler::{Assignment, JobSnapshot, Scheduler, SchedulerConfig, TaskKind, TaskPhase, TaskReport};
