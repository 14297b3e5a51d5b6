//! Demonstration callers built on the concurrency core

pub mod file_task;
pub mod notification;
pub mod order;

pub use file_task::{FileReport, FileTask, ParallelFileProcessor};
pub use notification::NotificationTask;
pub use order::AsyncOrderService;
