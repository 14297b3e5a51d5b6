use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use taskyard::{
    DispatchError, Outcome, PoolConfig, PoolState, TaskContext, TaskFailure, TaskStatus,
    WorkerPool,
};

fn config(width: usize) -> PoolConfig {
    PoolConfig::default()
        .with_width(width)
        .with_grace_period(Duration::from_millis(200))
        .with_cancel_wait(Duration::from_millis(100))
}

#[test]
fn test_batch_outcomes_follow_submission_order() {
    let pool = WorkerPool::new(3).unwrap();

    // Later tasks finish first
    let tasks = (0..6u64).map(|i| {
        move |ctx: &TaskContext| -> Result<u64, TaskFailure> {
            ctx.sleep(Duration::from_millis((6 - i) * 10))?;
            Ok(i)
        }
    });
    let outcomes = pool.submit_batch(tasks).unwrap();

    let values: Vec<u64> = outcomes.into_iter().map(|o| o.into_result().unwrap()).collect();
    assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_failed_task_does_not_affect_siblings() {
    let pool = WorkerPool::new(3).unwrap();

    let outcomes = pool
        .submit_batch((0..3).map(|i| {
            move |_: &TaskContext| {
                if i == 1 {
                    Err(TaskFailure::error("boom"))
                } else {
                    Ok(i)
                }
            }
        }))
        .unwrap();

    let statuses: Vec<TaskStatus> = outcomes.iter().map(Outcome::status).collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Completed]
    );
    assert_eq!(outcomes[1].failure(), Some(&TaskFailure::error("boom")));
}

#[test]
fn test_width_bounds_concurrency() {
    let pool = WorkerPool::new(2).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let tasks = (0..5).map(|_| {
        let active = active.clone();
        let peak = peak.clone();
        move |_: &TaskContext| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    });
    let outcomes = pool.submit_batch(tasks).unwrap();
    let elapsed = start.elapsed();

    assert!(outcomes.iter().all(Outcome::is_completed));
    assert!(peak.load(Ordering::SeqCst) <= 2);
    // Five tasks on two workers take three rounds
    assert!(elapsed >= Duration::from_millis(300), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
}

#[test]
fn test_shutdown_abandons_task_ignoring_cancellation() {
    let pool = WorkerPool::from_config(&config(1)).unwrap();

    let stubborn = pool
        .submit(|_: &TaskContext| {
            thread::sleep(Duration::from_millis(1500));
            Ok("late")
        })
        .unwrap();
    let queued = pool.submit(|_: &TaskContext| Ok("never")).unwrap();
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    let report = pool.shutdown();

    assert!(start.elapsed() < Duration::from_millis(1000));
    assert!(!report.graceful);
    assert_eq!(report.cancelled_jobs, 1);
    assert_eq!(report.abandoned_workers, 1);
    assert_eq!(pool.state(), PoolState::Terminated);
    assert_eq!(stubborn.wait().failure(), Some(&TaskFailure::Cancelled));
    assert_eq!(queued.wait().failure(), Some(&TaskFailure::Cancelled));
}

#[test]
fn test_cooperative_task_observes_forced_shutdown() {
    let pool = WorkerPool::from_config(&config(2)).unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            pool.submit(|ctx: &TaskContext| -> Result<(), TaskFailure> {
                ctx.sleep(Duration::from_secs(30))?;
                Ok(())
            })
            .unwrap()
        })
        .collect();
    thread::sleep(Duration::from_millis(50));

    let report = pool.shutdown();
    assert!(!report.graceful);
    assert_eq!(report.abandoned_workers, 0);
    for handle in handles {
        assert_eq!(handle.wait().failure(), Some(&TaskFailure::Cancelled));
    }
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = WorkerPool::new(2).unwrap();
    assert!(pool.shutdown().graceful);

    let again = pool.shutdown();
    assert!(again.graceful);
    assert_eq!(again.cancelled_jobs, 0);
    assert!(matches!(
        pool.submit(|_: &TaskContext| Ok(())),
        Err(DispatchError::ShutDown)
    ));
}

#[test]
fn test_concurrent_shutdowns_share_one_report() {
    let pool = Arc::new(WorkerPool::from_config(&config(1)).unwrap());
    pool.submit(|_: &TaskContext| {
        thread::sleep(Duration::from_millis(1000));
        Ok(())
    })
    .unwrap();
    thread::sleep(Duration::from_millis(50));

    let first = {
        let pool = pool.clone();
        thread::spawn(move || pool.shutdown())
    };
    // Let the first call take the queue
    while pool.state() == PoolState::Accepting {
        thread::sleep(Duration::from_millis(1));
    }

    let second = pool.shutdown();
    assert_eq!(pool.state(), PoolState::Terminated);
    assert!(!second.graceful);
    assert_eq!(second.abandoned_workers, 1);
    assert_eq!(first.join().unwrap(), second);
}

#[test]
fn test_state_leaves_accepting_once_submissions_are_refused() {
    let pool = Arc::new(WorkerPool::from_config(&config(1)).unwrap());
    pool.submit(|ctx: &TaskContext| -> Result<(), TaskFailure> {
        ctx.sleep(Duration::from_millis(100))?;
        Ok(())
    })
    .unwrap();

    let closer = {
        let pool = pool.clone();
        thread::spawn(move || pool.shutdown())
    };
    loop {
        match pool.submit(|_: &TaskContext| Ok(())) {
            Err(DispatchError::ShutDown) => break,
            Ok(handle) => drop(handle),
            Err(e) => panic!("unexpected error: {}", e),
        }
        thread::yield_now();
    }
    assert_ne!(pool.state(), PoolState::Accepting);
    assert!(closer.join().unwrap().graceful);
}

#[test]
fn test_metrics_match_outcomes_after_abandonment() {
    let pool = WorkerPool::from_config(
        &PoolConfig::default()
            .with_width(1)
            .with_grace_period(Duration::from_millis(50))
            .with_cancel_wait(Duration::from_millis(50)),
    )
    .unwrap();

    let stubborn = pool
        .submit(|_: &TaskContext| {
            thread::sleep(Duration::from_millis(400));
            Ok(())
        })
        .unwrap();
    thread::sleep(Duration::from_millis(20));

    let report = pool.shutdown();
    assert_eq!(report.abandoned_workers, 1);
    assert_eq!(stubborn.wait().failure(), Some(&TaskFailure::Cancelled));

    let after_shutdown = pool.metrics();
    assert_eq!(after_shutdown.completed, 0);
    assert_eq!(after_shutdown.failed, 1);
    assert_eq!(after_shutdown.cancelled, 1);

    // The detached worker finishes its task later; nobody sees that result
    thread::sleep(Duration::from_millis(600));
    let later = pool.metrics();
    assert_eq!(later.completed, 0);
    assert_eq!(later.failed, 1);
    assert_eq!(later.in_flight(), 0);
}

#[test]
fn test_submit_from_many_threads() {
    let pool = Arc::new(WorkerPool::new(4).unwrap());

    let submitters: Vec<_> = (0..4u64)
        .map(|t| {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.submit_batch((0..25u64).map(|i| move |_: &TaskContext| Ok(t * 100 + i)))
                    .unwrap()
            })
        })
        .collect();

    for (t, submitter) in submitters.into_iter().enumerate() {
        let outcomes = submitter.join().unwrap();
        let expected: Vec<u64> = (0..25).map(|i| t as u64 * 100 + i).collect();
        let values: Vec<u64> = outcomes.into_iter().filter_map(|o| o.into_result().ok()).collect();
        assert_eq!(values, expected);
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.submitted, 100);
    assert_eq!(metrics.completed, 100);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_one_outcome_per_task(width in 1usize..5, fails in proptest::collection::vec(any::<bool>(), 0..20)) {
        let pool = WorkerPool::new(width).unwrap();
        let tasks = fails.clone().into_iter().enumerate().map(|(i, fail)| {
            move |_: &TaskContext| {
                if fail {
                    Err(TaskFailure::error(format!("task {}", i)))
                } else {
                    Ok(i)
                }
            }
        });
        let outcomes = pool.submit_batch(tasks).unwrap();

        prop_assert_eq!(outcomes.len(), fails.len());
        for (i, (outcome, fail)) in outcomes.iter().zip(&fails).enumerate() {
            prop_assert_eq!(outcome.is_failed(), *fail);
            if !fail {
                prop_assert_eq!(outcome.value(), Some(&i));
            }
        }
    }
}
