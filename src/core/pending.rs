//! Set-once result slots
//!
//! A `Promise` is the producing half and a `PendingResult` the consuming half.
//! The first resolution wins. A promise dropped without a value resolves the
//! slot as abandoned, so a waiter never hangs on a producer that went away.

use crate::errors::Cancelled;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

enum SlotState<T> {
    Empty,
    Ready(T),
    Abandoned,
    Taken,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn settle(&self, next: SlotState<T>) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, SlotState::Empty) {
            return false;
        }
        *state = next;
        drop(state);
        self.ready.notify_all();
        true
    }
}

trait Settle: Send + Sync {
    fn abandon(&self) -> bool;
}

impl<T: Send> Settle for Slot<T> {
    fn abandon(&self) -> bool {
        self.settle(SlotState::Abandoned)
    }
}

/// Create a connected promise / pending-result pair
pub fn pending<T>() -> (Promise<T>, PendingResult<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Empty),
        ready: Condvar::new(),
    });
    (
        Promise { slot: slot.clone() },
        PendingResult { slot },
    )
}

/// Producing half of a pending result
pub struct Promise<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Promise<T> {
    /// Resolve with `value`. Returns `false` if the slot was already settled.
    pub fn resolve(self, value: T) -> bool {
        self.slot.settle(SlotState::Ready(value))
    }

    /// Resolve with `value`, running `on_settle` first under the slot lock.
    /// `on_settle` is skipped when the slot was already settled, and always
    /// runs before any waiter wakes.
    pub(crate) fn resolve_with<F>(self, value: T, on_settle: F) -> bool
    where
        F: FnOnce(&T),
    {
        let mut state = self.slot.state.lock();
        if !matches!(*state, SlotState::Empty) {
            return false;
        }
        on_settle(&value);
        *state = SlotState::Ready(value);
        drop(state);
        self.slot.ready.notify_all();
        true
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Type-erased handle that can abandon this slot from elsewhere
    pub(crate) fn abandon_handle(&self) -> AbandonHandle {
        let erased: Arc<dyn Settle> = self.slot.clone();
        AbandonHandle {
            slot: Arc::downgrade(&erased),
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        if matches!(*state, SlotState::Empty) {
            *state = SlotState::Abandoned;
            drop(state);
            self.slot.ready.notify_all();
        }
    }
}

/// Lets the owner of a job settle its slot as abandoned without knowing `T`
#[derive(Clone)]
pub(crate) struct AbandonHandle {
    slot: Weak<dyn Settle>,
}

impl AbandonHandle {
    pub(crate) fn abandon(&self) -> bool {
        self.slot.upgrade().map(|s| s.abandon()).unwrap_or(false)
    }
}

/// Consuming half: a result not yet available, resolved exactly once
pub struct PendingResult<T> {
    slot: Arc<Slot<T>>,
}

impl<T> PendingResult<T> {
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.slot.state.lock(), SlotState::Empty)
    }

    /// Wait up to `timeout` for resolution. Returns whether the slot is settled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_deadline(Instant::now() + timeout)
    }

    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Empty) {
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return !matches!(*state, SlotState::Empty);
            }
        }
        true
    }

    /// Block until resolved. An abandoned slot yields `Err(Cancelled)`.
    pub fn wait(self) -> Result<T, Cancelled> {
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Empty) {
            self.slot.ready.wait(&mut state);
        }
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Ready(value) => Ok(value),
            _ => Err(Cancelled),
        }
    }
}

impl<T> std::fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
