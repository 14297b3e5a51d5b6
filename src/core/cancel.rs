//! Cooperative cancellation
//!
//! OS threads cannot be interrupted from outside, so every unit of work gets a
//! `TaskContext` wrapping a `CancellationToken`. Sleeps and waits performed
//! through the context wake as soon as the token trips.

use crate::errors::Cancelled;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

struct TokenState {
    cancelled: bool,
    children: Vec<Weak<TokenInner>>,
}

struct TokenInner {
    state: Mutex<TokenState>,
    signal: Condvar,
}

/// Cancellation token for coordinated shutdown
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                state: Mutex::new(TokenState {
                    cancelled: false,
                    children: Vec::new(),
                }),
                signal: Condvar::new(),
            }),
        }
    }

    /// Cancel the token and every child derived from it
    pub fn cancel(&self) {
        let children = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.children)
        };
        self.inner.signal.notify_all();

        for child in children.iter().filter_map(Weak::upgrade) {
            CancellationToken { inner: child }.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Create child token. Cancelling the parent cancels the child, not the reverse.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut state = self.inner.state.lock();
        if state.cancelled {
            drop(state);
            child.cancel();
        } else {
            state.children.retain(|w| w.strong_count() > 0);
            state.children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Sleep for `duration`, waking early with `Err(Cancelled)` if the token trips
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now() + duration;
        let mut state = self.inner.state.lock();
        loop {
            if state.cancelled {
                return Err(Cancelled);
            }
            if self.inner.signal.wait_until(&mut state, deadline).timed_out() {
                return if state.cancelled { Err(Cancelled) } else { Ok(()) };
            }
        }
    }

    /// Block until cancelled or `timeout` elapses. Returns whether the token tripped.
    pub fn wait_cancelled(&self, timeout: Duration) -> bool {
        self.sleep(timeout).is_err()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Execution context handed to every task
#[derive(Debug, Clone)]
pub struct TaskContext {
    token: CancellationToken,
    worker: Option<usize>,
}

impl TaskContext {
    pub fn new(token: CancellationToken) -> Self {
        Self { token, worker: None }
    }

    pub(crate) fn for_worker(token: CancellationToken, worker: usize) -> Self {
        Self {
            token,
            worker: Some(worker),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Return `Err(Cancelled)` if an interrupt is pending
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.token.sleep(duration)
    }

    /// Index of the pool worker running this task, `None` outside a pool
    pub fn worker(&self) -> Option<usize> {
        self.worker
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancellation_wakes_sleeper() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let start = Instant::now();
        let sleeper = thread::spawn(move || token_clone.sleep(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert_eq!(sleeper.join().unwrap(), Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_sleep_completes_without_cancel() {
        let token = CancellationToken::new();
        assert_eq!(token.sleep(Duration::from_millis(5)), Ok(()));
        assert!(!token.wait_cancelled(Duration::from_millis(1)));
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel();
        assert!(!parent.is_cancelled());
        assert!(grandchild.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn test_checkpoint() {
        let ctx = TaskContext::new(CancellationToken::new());
        assert!(ctx.checkpoint().is_ok());
        ctx.token().cancel();
        assert_eq!(ctx.checkpoint(), Err(Cancelled));
        assert_eq!(ctx.worker(), None);
    }
}
