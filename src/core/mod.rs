//! Core execution primitives
//!
//! Outcomes, cancellation and set-once result slots shared by the pool,
//! the join combinator and the detached runner.

pub mod cancel;
pub mod outcome;
pub mod pending;

pub use cancel::{CancellationToken, TaskContext};
pub use outcome::{Outcome, TaskStatus};
pub use pending::{pending, PendingResult, Promise};
