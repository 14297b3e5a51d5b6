use std::fmt;

/// Raised by cache operations when the key is the absent sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKey {
    pub operation: &'static str,
}

impl InvalidKey {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

impl fmt::Display for InvalidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid key passed to cache {}", self.operation)
    }
}

impl std::error::Error for InvalidKey {}

/// Cooperative cancellation observed during a wait or sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task was cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Why a single task did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The task reported an error of its own
    Error(String),
    /// The task panicked; the payload message is kept when it is a string
    Panicked(String),
    /// The task was interrupted and stopped
    Cancelled,
}

impl TaskFailure {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Build a failure from a `catch_unwind` payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "Task failed: {}", msg),
            Self::Panicked(msg) => write!(f, "Task panicked: {}", msg),
            Self::Cancelled => write!(f, "Task was cancelled"),
        }
    }
}

impl std::error::Error for TaskFailure {}

impl From<Cancelled> for TaskFailure {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Pool-level misuse, reported to the submitting caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The pool has begun shutting down and accepts no more work
    ShutDown,
    /// A pool needs at least one worker
    InvalidWidth,
    /// The operating system refused to start a worker thread
    WorkerSpawn(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutDown => write!(f, "Worker pool is shut down and rejects new submissions"),
            Self::InvalidWidth => write!(f, "Worker pool width must be at least 1"),
            Self::WorkerSpawn(msg) => write!(f, "Failed to spawn worker thread: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

/// A combine that did not deliver a merged result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinError {
    pub left: Option<TaskFailure>,
    pub right: Option<TaskFailure>,
    /// Both branches succeeded but `merge` or `on_done` panicked
    pub delivery: Option<TaskFailure>,
}

impl JoinError {
    pub(crate) fn from_branches<A, B>(
        left: &Result<A, TaskFailure>,
        right: &Result<B, TaskFailure>,
    ) -> Self {
        Self {
            left: left.as_ref().err().cloned(),
            right: right.as_ref().err().cloned(),
            delivery: None,
        }
    }

    pub(crate) fn delivery(failure: TaskFailure) -> Self {
        Self {
            left: None,
            right: None,
            delivery: Some(failure),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(d) = &self.delivery {
            return write!(f, "Delivering the merged result failed: {}", d);
        }
        match (&self.left, &self.right) {
            (Some(l), Some(r)) => write!(f, "Both branches failed: left: {}; right: {}", l, r),
            (Some(l), None) => write!(f, "Left branch failed: {}", l),
            (None, Some(r)) => write!(f, "Right branch failed: {}", r),
            (None, None) => write!(f, "Join failed"),
        }
    }
}

impl std::error::Error for JoinError {}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to read config: {}", e),
            Self::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_converts_to_failure() {
        fn step() -> Result<(), TaskFailure> {
            let interrupted: Result<(), Cancelled> = Err(Cancelled);
            interrupted?;
            Ok(())
        }
        assert_eq!(step(), Err(TaskFailure::Cancelled));
    }

    #[test]
    fn test_panic_payload_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(TaskFailure::from_panic(payload), TaskFailure::Panicked("boom".into()));

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(TaskFailure::from_panic(payload), TaskFailure::Panicked("owned".into()));
    }

    #[test]
    fn test_join_error_display() {
        let left: Result<(), TaskFailure> = Err(TaskFailure::error("payment declined"));
        let right: Result<(), TaskFailure> = Ok(());
        let err = JoinError::from_branches(&left, &right);
        assert_eq!(err.to_string(), "Left branch failed: Task failed: payment declined");
        assert!(err.right.is_none());
    }
}
