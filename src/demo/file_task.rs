//! Parallel file processing on the worker pool

use crate::concurrency::{ShutdownReport, Task, WorkerPool};
use crate::core::{Outcome, TaskContext, TaskStatus};
use crate::errors::{DispatchError, TaskFailure};
use crate::infrastructure::config::PoolConfig;
use crate::infrastructure::metrics::MetricsSnapshot;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Simulated processing of one file
#[derive(Debug, Clone)]
pub struct FileTask {
    file_name: String,
    delay: Duration,
}

impl FileTask {
    pub fn new(file_name: impl Into<String>, delay: Duration) -> Self {
        Self {
            file_name: file_name.into(),
            delay,
        }
    }
}

impl Task<String> for FileTask {
    fn run(self, ctx: &TaskContext) -> Result<String, TaskFailure> {
        if self.file_name.trim().is_empty() {
            error!("Invalid file name provided");
            return Err(TaskFailure::error("invalid file name"));
        }

        info!(file = %self.file_name, "Processing file");
        if let Err(cancelled) = ctx.sleep(self.delay) {
            error!(file = %self.file_name, "File processing interrupted");
            return Err(cancelled.into());
        }
        info!(file = %self.file_name, "Completed file");
        Ok(self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ParallelFileProcessor {
    pool: WorkerPool,
    delay: Duration,
}

impl ParallelFileProcessor {
    pub fn new(config: &PoolConfig, delay: Duration) -> Result<Self, DispatchError> {
        Ok(Self {
            pool: WorkerPool::from_config(config)?,
            delay,
        })
    }

    /// Process every file in parallel; one report per file, in input order
    pub fn process_files(&self, files: &[String]) -> Result<Vec<FileReport>, DispatchError> {
        if files.is_empty() {
            warn!("No files provided for processing");
            return Ok(Vec::new());
        }

        let tasks = files.iter().map(|f| FileTask::new(f.clone(), self.delay));
        let outcomes: Vec<Outcome<String>> = self.pool.submit_batch(tasks)?;

        let reports = files
            .iter()
            .zip(outcomes)
            .map(|(file, outcome)| {
                info!(file = %file, status = %outcome.status(), "File processed");
                FileReport {
                    file: file.clone(),
                    status: outcome.status(),
                    error: match outcome {
                        Outcome::Completed(_) => None,
                        Outcome::Failed(e) => Some(e.to_string()),
                    },
                }
            })
            .collect();
        Ok(reports)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pool.metrics()
    }

    pub fn shutdown(&self) -> ShutdownReport {
        self.pool.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> ParallelFileProcessor {
        ParallelFileProcessor::new(&PoolConfig::default(), Duration::from_millis(5)).unwrap()
    }

    #[test]
    fn test_process_files() {
        let files = vec!["test1.txt".to_string(), "test2.txt".to_string()];
        let reports = processor().process_files(&files).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status == TaskStatus::Completed));
        assert_eq!(reports[1].file, "test2.txt");
    }

    #[test]
    fn test_process_empty_file_list() {
        assert!(processor().process_files(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_blank_name_fails_alone() {
        let files = vec!["a.txt".to_string(), "   ".to_string(), "c.txt".to_string()];
        let reports = processor().process_files(&files).unwrap();

        let statuses: Vec<_> = reports.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Completed]
        );
        assert_eq!(reports[1].error.as_deref(), Some("Task failed: invalid file name"));
    }
}
