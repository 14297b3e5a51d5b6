//! taskyard - an in-process concurrency core
//!
//! A fixed-size worker pool with ordered batch results and two-phase
//! shutdown, a combinator joining two independent computations, a
//! thread-safe cache and a runner for detached background work.

pub mod cache;
pub mod concurrency;
pub mod core;
pub mod demo;
pub mod errors;
pub mod frontend;
pub mod infrastructure;

// Re-export commonly used items
pub use cache::{CacheKey, CacheStats, ThreadSafeCache};
pub use concurrency::{
    combine, combine_async, run_detached, run_detached_with, spawn_combine, CombineHandle,
    DetachedHandle, PoolState, ShutdownReport, Task, TaskHandle, WorkerPool,
};
pub use crate::core::{pending, CancellationToken, Outcome, PendingResult, Promise, TaskContext, TaskStatus};
pub use errors::{Cancelled, ConfigError, DispatchError, InvalidKey, JoinError, TaskFailure};
pub use frontend::cli_main;
pub use infrastructure::{
    init_dev_logging, init_logging, init_prod_logging, Config, LogConfig, LogFormat, LogOutput,
    MetricsSnapshot, PoolConfig,
};
