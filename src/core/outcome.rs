use crate::errors::TaskFailure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker
    Pending,
    /// Running on a worker
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Terminal result of a task. Never partial: either the value or the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Failed(TaskFailure),
}

impl<T> Outcome<T> {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Completed(_) => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Completed(v) => Some(v),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(f) => Some(f),
        }
    }

    pub fn into_result(self) -> Result<T, TaskFailure> {
        self.into()
    }
}

impl<T> From<Result<T, TaskFailure>> for Outcome<T> {
    fn from(result: Result<T, TaskFailure>) -> Self {
        match result {
            Ok(v) => Self::Completed(v),
            Err(e) => Self::Failed(e),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, TaskFailure> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Completed(v) => Ok(v),
            Outcome::Failed(e) => Err(e),
        }
    }
}
