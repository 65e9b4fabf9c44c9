use std::fmt;

use tonic::Status;

use crate::scheduler::TaskKind;

#[derive(Debug)]
pub enum CoordinatorError {
    /// The coordinator was asked to run a job it cannot schedule.
    InvalidConfig(String),
    /// A report named a task index the job does not have.
    UnknownTask { kind: TaskKind, index: u32 },
    /// A report was malformed (bad file names, missing fields).
    InvalidReport(String),
    /// A staged file could not be renamed into place.
    Publish {
        file: String,
        source: std::io::Error,
    },
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            CoordinatorError::UnknownTask { kind, index } => {
                write!(f, "no {kind} task with index {index}")
            }
            CoordinatorError::InvalidReport(msg) => write!(f, "invalid task report: {msg}"),
            CoordinatorError::Publish { file, source } => {
                write!(f, "failed to publish {file}: {source}")
            }
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Publish { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CoordinatorError> for Status {
    fn from(error: CoordinatorError) -> Self {
        match error {
            CoordinatorError::UnknownTask { .. } | CoordinatorError::InvalidReport(_) => {
                Status::invalid_argument(error.to_string())
            }
            CoordinatorError::InvalidConfig(_) | CoordinatorError::Publish { .. } => {
                Status::internal(error.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
