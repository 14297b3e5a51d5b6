//! Concurrency patterns
//!
//! - **Worker pool** (`pool`): bounded parallel batches with two-phase shutdown
//! - **Join** (`join`): run two computations, merge once both finish
//! - **Detached** (`detached`): fire-and-forget work with cooperative cancellation

pub mod detached;
pub mod join;
pub mod pool;

pub use detached::{run_detached, run_detached_with, DetachedHandle};
pub use join::{combine, combine_async, spawn_combine, CombineHandle};
pub use pool::{PoolState, ShutdownReport, Task, TaskHandle, WorkerPool};
