//! Fire-and-forget work on a dedicated thread

use crate::core::{CancellationToken, TaskContext};
use crate::errors::{DispatchError, TaskFailure};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Handle to detached work. Dropping it detaches; joining is optional.
pub struct DetachedHandle {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<Result<(), TaskFailure>>,
}

impl DetachedHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the work to stop at its next sleep or checkpoint
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for the work to end and report how it ended
    pub fn join(self) -> Result<(), TaskFailure> {
        self.handle
            .join()
            .unwrap_or_else(|payload| Err(TaskFailure::from_panic(payload)))
    }
}

/// Start `work` on a new thread immediately
pub fn run_detached<F>(name: impl Into<String>, work: F) -> Result<DetachedHandle, DispatchError>
where
    F: FnOnce(&TaskContext) -> Result<(), TaskFailure> + Send + 'static,
{
    spawn(name.into(), CancellationToken::new(), work)
}

/// Start `work` under a supervising token; cancelling `supervisor` stops it
pub fn run_detached_with<F>(
    name: impl Into<String>,
    supervisor: &CancellationToken,
    work: F,
) -> Result<DetachedHandle, DispatchError>
where
    F: FnOnce(&TaskContext) -> Result<(), TaskFailure> + Send + 'static,
{
    spawn(name.into(), supervisor.child(), work)
}

fn spawn<F>(name: String, token: CancellationToken, work: F) -> Result<DetachedHandle, DispatchError>
where
    F: FnOnce(&TaskContext) -> Result<(), TaskFailure> + Send + 'static,
{
    let ctx = TaskContext::new(token.clone());
    let thread_name = name.clone();

    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            debug!(task = %thread_name, "Detached task started");
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)))
                .unwrap_or_else(|payload| Err(TaskFailure::from_panic(payload)));

            match &result {
                Ok(()) => info!(task = %thread_name, "Detached task completed"),
                Err(TaskFailure::Cancelled) => {
                    // Keep the signal visible to whoever holds the token
                    ctx.token().cancel();
                    warn!(task = %thread_name, "Detached task interrupted");
                }
                Err(e) => error!(task = %thread_name, "Detached task failed: {}", e),
            }
            result
        })
        .map_err(|e| DispatchError::WorkerSpawn(e.to_string()))?;

    Ok(DetachedHandle { name, token, handle })
}
