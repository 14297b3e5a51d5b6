//! Join two independent computations
//!
//! Both branches always run to completion before anything else happens, so
//! no work is left orphaned. Only when both succeed is `merge` applied (once)
//! and its result handed to `on_done`. A panic in `merge` or `on_done` is
//! reported as a delivery failure by every entry point.

use crate::errors::{JoinError, TaskFailure};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

fn run_branch<X, F>(branch: F) -> Result<X, TaskFailure>
where
    F: FnOnce() -> Result<X, TaskFailure>,
{
    panic::catch_unwind(AssertUnwindSafe(branch))
        .unwrap_or_else(|payload| Err(TaskFailure::from_panic(payload)))
}

fn finish<A, B, C, M, D>(
    left: Result<A, TaskFailure>,
    right: Result<B, TaskFailure>,
    merge: M,
    on_done: D,
) -> Result<(), JoinError>
where
    M: FnOnce(A, B) -> C,
    D: FnOnce(C),
{
    match (left, right) {
        (Ok(a), Ok(b)) => {
            debug!("Both branches completed, merging");
            panic::catch_unwind(AssertUnwindSafe(|| on_done(merge(a, b)))).map_err(|payload| {
                let err = JoinError::delivery(TaskFailure::from_panic(payload));
                warn!("{}", err);
                err
            })
        }
        (left, right) => {
            let err = JoinError::from_branches(&left, &right);
            warn!("{}", err);
            Err(err)
        }
    }
}

/// Run `a` and `b` on two threads, block until both finish, then merge and
/// deliver. Returns once `on_done` has run.
pub fn combine<A, B, C, FA, FB, M, D>(a: FA, b: FB, merge: M, on_done: D) -> Result<(), JoinError>
where
    A: Send,
    B: Send,
    FA: FnOnce() -> Result<A, TaskFailure> + Send,
    FB: FnOnce() -> Result<B, TaskFailure> + Send,
    M: FnOnce(A, B) -> C,
    D: FnOnce(C),
{
    let (left, right) = thread::scope(|s| {
        let left = s.spawn(|| run_branch(a));
        let right = s.spawn(|| run_branch(b));
        (join_scoped(left.join()), join_scoped(right.join()))
    });
    finish(left, right, merge, on_done)
}

fn join_scoped<X>(joined: thread::Result<Result<X, TaskFailure>>) -> Result<X, TaskFailure> {
    joined.unwrap_or_else(|payload| Err(TaskFailure::from_panic(payload)))
}

/// Async entry point. Branches run on tokio's blocking pool; the calling
/// task is suspended, not blocked, while they run.
pub async fn combine_async<A, B, C, FA, FB, M, D>(
    a: FA,
    b: FB,
    merge: M,
    on_done: D,
) -> Result<(), JoinError>
where
    A: Send + 'static,
    B: Send + 'static,
    FA: FnOnce() -> Result<A, TaskFailure> + Send + 'static,
    FB: FnOnce() -> Result<B, TaskFailure> + Send + 'static,
    M: FnOnce(A, B) -> C,
    D: FnOnce(C),
{
    let left = tokio::task::spawn_blocking(move || run_branch(a));
    let right = tokio::task::spawn_blocking(move || run_branch(b));
    let (left, right) = tokio::join!(left, right);

    finish(join_tokio(left), join_tokio(right), merge, on_done)
}

fn join_tokio<X>(joined: Result<Result<X, TaskFailure>, tokio::task::JoinError>) -> Result<X, TaskFailure> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(TaskFailure::Cancelled),
        Err(e) => Err(TaskFailure::Panicked(e.to_string())),
    }
}

/// A combine running in the background
pub struct CombineHandle {
    handle: JoinHandle<Result<(), JoinError>>,
}

impl CombineHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the combine, including `on_done`, has finished
    pub fn join(self) -> Result<(), JoinError> {
        self.handle
            .join()
            .unwrap_or_else(|payload| Err(JoinError::delivery(TaskFailure::from_panic(payload))))
    }
}

/// Start a combine without waiting for it
pub fn spawn_combine<A, B, C, FA, FB, M, D>(a: FA, b: FB, merge: M, on_done: D) -> CombineHandle
where
    A: Send + 'static,
    B: Send + 'static,
    FA: FnOnce() -> Result<A, TaskFailure> + Send + 'static,
    FB: FnOnce() -> Result<B, TaskFailure> + Send + 'static,
    M: FnOnce(A, B) -> C + Send + 'static,
    D: FnOnce(C) + Send + 'static,
{
    CombineHandle {
        handle: thread::spawn(move || combine(a, b, merge, on_done)),
    }
}
