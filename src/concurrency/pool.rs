//! Fixed-size worker pool
//!
//! `width` named OS threads drain a shared crossbeam queue. Every submitted
//! task carries its own promise; a batch waits on those promises in
//! submission order, so results line up with inputs whatever order the
//! workers finish in.
//!
//! Shutdown is two-phase. The queue is closed and workers get
//! `grace_period` to drain it. Past that, the pool drops whatever is still
//! queued, then trips its cancellation token and waits `cancel_wait` more.
//! Workers still busy after that are abandoned: their in-flight promise is
//! settled as cancelled and the thread is detached.

use crate::core::pending::AbandonHandle;
use crate::core::{pending, CancellationToken, Outcome, PendingResult, TaskContext, TaskStatus};
use crate::errors::{DispatchError, TaskFailure};
use crate::infrastructure::config::PoolConfig;
use crate::infrastructure::metrics::{MetricsSnapshot, PoolMetrics};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A unit of work runnable on the pool
pub trait Task<T>: Send + 'static {
    fn run(self, ctx: &TaskContext) -> Result<T, TaskFailure>;
}

impl<T, F> Task<T> for F
where
    F: FnOnce(&TaskContext) -> Result<T, TaskFailure> + Send + 'static,
{
    fn run(self, ctx: &TaskContext) -> Result<T, TaskFailure> {
        self(ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Accepting,
    /// Shutdown started; queued work still runs, new work is rejected
    Draining,
    Terminated,
}

/// What happened during shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every worker exited within the grace period
    pub graceful: bool,
    /// Queued jobs dropped without running
    pub cancelled_jobs: usize,
    /// Workers still running after forced cancellation, now detached
    pub abandoned_workers: usize,
    pub elapsed: Duration,
}

/// Handle to one submitted task
pub struct TaskHandle<T> {
    id: u64,
    pending: PendingResult<Outcome<T>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_resolved()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.pending.wait_timeout(timeout)
    }

    /// Block until the task's outcome is known. Work dropped by a forced
    /// shutdown reports `Failed(Cancelled)`.
    pub fn wait(self) -> Outcome<T> {
        self.pending
            .wait()
            .unwrap_or(Outcome::Failed(TaskFailure::Cancelled))
    }
}

type Job = Box<dyn FnOnce(&TaskContext) + Send>;

struct Envelope {
    id: u64,
    job: Job,
    abandon: AbandonHandle,
}

struct Shared {
    cancel: CancellationToken,
    metrics: PoolMetrics,
    /// Abandon hook of the job each worker is running, indexed by worker
    in_flight: Mutex<Vec<Option<AbandonHandle>>>,
}

pub struct WorkerPool {
    config: PoolConfig,
    state: RwLock<PoolState>,
    sender: RwLock<Option<Sender<Envelope>>>,
    /// Kept to drop queued jobs during forced cancellation
    queue: Receiver<Envelope>,
    workers: Mutex<Vec<Option<JoinHandle<()>>>>,
    exited: Receiver<usize>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    /// Set once by the shutdown that ran; later callers wait on `terminated`
    report: Mutex<Option<ShutdownReport>>,
    terminated: Condvar,
}

impl WorkerPool {
    /// Pool with `width` workers and default shutdown timings
    pub fn new(width: usize) -> Result<Self, DispatchError> {
        Self::from_config(&PoolConfig::default().with_width(width))
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, DispatchError> {
        if config.width == 0 {
            return Err(DispatchError::InvalidWidth);
        }

        let (sender, queue) = channel::unbounded::<Envelope>();
        let (exit_tx, exited) = channel::unbounded::<usize>();
        let shared = Arc::new(Shared {
            cancel: CancellationToken::new(),
            metrics: PoolMetrics::new(),
            in_flight: Mutex::new(vec![None; config.width]),
        });

        let mut workers = Vec::with_capacity(config.width);
        for index in 0..config.width {
            let queue = queue.clone();
            let shared = shared.clone();
            let exit_tx = exit_tx.clone();

            // On error the already spawned workers see a closed queue and exit
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || worker_loop(index, queue, shared, exit_tx))
                .map_err(|e| DispatchError::WorkerSpawn(e.to_string()))?;
            workers.push(Some(handle));
        }

        info!(width = config.width, "Worker pool started");

        Ok(Self {
            config: config.clone(),
            state: RwLock::new(PoolState::Accepting),
            sender: RwLock::new(Some(sender)),
            queue,
            workers: Mutex::new(workers),
            exited,
            shared,
            next_id: AtomicU64::new(0),
            report: Mutex::new(None),
            terminated: Condvar::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn state(&self) -> PoolState {
        *self.state.read()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Submit one task
    pub fn submit<T, W>(&self, task: W) -> Result<TaskHandle<T>, DispatchError>
    where
        T: Send + 'static,
        W: Task<T>,
    {
        let sender = self.sender.read();
        let sender = sender.as_ref().ok_or(DispatchError::ShutDown)?;
        let handle = self.enqueue(sender, task)?;
        self.shared.metrics.record_submitted(1);
        Ok(handle)
    }

    /// Run every task and return their outcomes in submission order.
    ///
    /// Either the whole batch is enqueued or none of it is. A task's failure
    /// (error, panic, cancellation) shows up as `Outcome::Failed` in its slot
    /// and never affects its siblings.
    pub fn submit_batch<T, W, I>(&self, tasks: I) -> Result<Vec<Outcome<T>>, DispatchError>
    where
        T: Send + 'static,
        W: Task<T>,
        I: IntoIterator<Item = W>,
    {
        let tasks: Vec<W> = tasks.into_iter().collect();
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let size = tasks.len();

        let handles = {
            let sender = self.sender.read();
            let sender = sender.as_ref().ok_or(DispatchError::ShutDown)?;
            tasks
                .into_iter()
                .map(|task| self.enqueue(sender, task))
                .collect::<Result<Vec<_>, _>>()?
        };
        self.shared.metrics.record_submitted(size);
        info!(size, "Batch submitted");

        let outcomes: Vec<Outcome<T>> = handles.into_iter().map(TaskHandle::wait).collect();

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        info!(size, failed, "Batch finished");
        Ok(outcomes)
    }

    fn enqueue<T, W>(&self, sender: &Sender<Envelope>, task: W) -> Result<TaskHandle<T>, DispatchError>
    where
        T: Send + 'static,
        W: Task<T>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (promise, pending) = pending::<Outcome<T>>();
        let abandon = promise.abandon_handle();
        let shared = self.shared.clone();

        let job: Job = Box::new(move |ctx: &TaskContext| {
            let start = Instant::now();
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task.run(ctx))) {
                Ok(result) => Outcome::from(result),
                Err(payload) => {
                    let failure = TaskFailure::from_panic(payload);
                    error!(task = id, "{}", failure);
                    Outcome::Failed(failure)
                }
            };
            let elapsed = start.elapsed();
            // Counted only if the caller will see this outcome
            let settled = promise.resolve_with(outcome, |outcome| {
                shared.metrics.record_outcome(outcome, elapsed);
                debug!(task = id, status = %outcome.status(), "Task finished");
            });
            if !settled {
                debug!(task = id, "Task finished after being abandoned");
            }
        });

        sender
            .send(Envelope { id, job, abandon })
            .map_err(|_| DispatchError::ShutDown)?;
        debug!(task = id, status = %TaskStatus::Pending, "Task queued");

        Ok(TaskHandle { id, pending })
    }

    /// Shut down with the configured grace period
    pub fn shutdown(&self) -> ShutdownReport {
        self.shutdown_timeout(self.config.grace_period())
    }

    /// Skip the graceful phase: interrupt running tasks and drop queued ones
    pub fn shutdown_now(&self) -> ShutdownReport {
        self.shutdown_timeout(Duration::ZERO)
    }

    pub fn shutdown_timeout(&self, grace: Duration) -> ShutdownReport {
        let start = Instant::now();

        // Taking the sender under the write lock waits out any batch that is
        // halfway through enqueueing.
        {
            let mut sender = self.sender.write();
            if sender.take().is_none() {
                drop(sender);
                return self.wait_terminated();
            }
            *self.state.write() = PoolState::Draining;
        }
        info!(grace_ms = grace.as_millis() as u64, "Worker pool draining");

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let mut running = workers.iter().filter(|w| w.is_some()).count();

        running -= self.reap_workers(&mut workers, running, start + grace);
        let graceful = running == 0;

        let mut cancelled_jobs = 0;
        if !graceful {
            warn!(running, "Grace period elapsed, cancelling in-flight tasks");
            // Empty the queue first so a worker woken by the cancel finds nothing to pick up
            cancelled_jobs = self.drop_queued();
            self.shared.cancel.cancel();
            let deadline = Instant::now() + self.config.cancel_wait();
            running -= self.reap_workers(&mut workers, running, deadline);
        }

        if running > 0 {
            let in_flight = self.shared.in_flight.lock();
            for (index, slot) in in_flight.iter().enumerate() {
                if workers[index].is_some() {
                    if let Some(handle) = slot {
                        if handle.abandon() {
                            self.shared.metrics.record_failure(&TaskFailure::Cancelled);
                        }
                    }
                    error!(worker = index, "Worker ignored cancellation, abandoning it");
                }
            }
        }
        // Remaining handles are dropped here, detaching their threads

        let report = ShutdownReport {
            graceful,
            cancelled_jobs,
            abandoned_workers: running,
            elapsed: start.elapsed(),
        };
        info!(
            graceful = report.graceful,
            cancelled_jobs = report.cancelled_jobs,
            abandoned_workers = report.abandoned_workers,
            "Worker pool terminated"
        );

        let mut stored = self.report.lock();
        *self.state.write() = PoolState::Terminated;
        *stored = Some(report.clone());
        drop(stored);
        self.terminated.notify_all();
        report
    }

    /// Block until the shutdown already under way finishes, then return its report
    fn wait_terminated(&self) -> ShutdownReport {
        let mut stored = self.report.lock();
        loop {
            if let Some(report) = stored.as_ref() {
                return report.clone();
            }
            self.terminated.wait(&mut stored);
        }
    }

    /// Join workers as they report exit, until all are gone or `deadline`.
    /// Returns how many were joined.
    fn reap_workers(
        &self,
        workers: &mut [Option<JoinHandle<()>>],
        running: usize,
        deadline: Instant,
    ) -> usize {
        let mut joined = 0;
        while joined < running {
            match self.exited.recv_deadline(deadline) {
                Ok(index) => {
                    if let Some(handle) = workers[index].take() {
                        if handle.join().is_err() {
                            error!(worker = index, "Worker thread panicked");
                        }
                        joined += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        joined
    }

    /// Drop every job still waiting in the queue. Their promises settle as
    /// cancelled when dropped.
    fn drop_queued(&self) -> usize {
        let mut dropped = 0;
        for envelope in self.queue.try_iter() {
            debug!(task = envelope.id, "Dropping queued task");
            self.shared.metrics.record_failure(&TaskFailure::Cancelled);
            drop(envelope);
            dropped += 1;
        }
        dropped
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.state() != PoolState::Terminated {
            self.shutdown();
        }
    }
}

fn worker_loop(index: usize, queue: Receiver<Envelope>, shared: Arc<Shared>, exited: Sender<usize>) {
    let ctx = TaskContext::for_worker(shared.cancel.clone(), index);
    debug!(worker = index, "Worker started");

    while let Ok(envelope) = queue.recv() {
        if shared.cancel.is_cancelled() {
            // Forced shutdown raced us to this job
            shared.metrics.record_failure(&TaskFailure::Cancelled);
            continue;
        }

        let Envelope { id, job, abandon } = envelope;
        shared.in_flight.lock()[index] = Some(abandon);
        debug!(worker = index, task = id, status = %TaskStatus::Processing, "Task started");
        job(&ctx);
        shared.in_flight.lock()[index] = None;
    }

    debug!(worker = index, "Worker stopped");
    let _ = exited.send(index);
}
