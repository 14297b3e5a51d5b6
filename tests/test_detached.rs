use std::sync::mpsc;
use std::time::Duration;
use taskyard::{run_detached, run_detached_with, CancellationToken, TaskFailure};

#[test]
fn test_returns_before_work_finishes() {
    let (tx, rx) = mpsc::channel();
    let handle = run_detached("notify", move |ctx| {
        ctx.sleep(Duration::from_millis(100))?;
        let _ = tx.send("sent");
        Ok(())
    })
    .unwrap();

    assert!(!handle.is_finished());
    assert_eq!(handle.name(), "notify");
    handle.join().unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok("sent"));
}

#[test]
fn test_failure_stays_in_background() {
    let handle = run_detached("failing", |_| Err(TaskFailure::error("smtp down"))).unwrap();
    assert_eq!(handle.join(), Err(TaskFailure::error("smtp down")));
}

#[test]
fn test_cancel_interrupts_sleep() {
    let handle = run_detached("sleeper", |ctx| {
        ctx.sleep(Duration::from_secs(30))?;
        Ok(())
    })
    .unwrap();

    handle.cancel();
    assert!(handle.is_cancelled());
    assert_eq!(handle.join(), Err(TaskFailure::Cancelled));
}

#[test]
fn test_supervisor_cancels_children() {
    let supervisor = CancellationToken::new();
    let children: Vec<_> = (0..3)
        .map(|i| {
            run_detached_with(format!("child-{}", i), &supervisor, |ctx| {
                ctx.sleep(Duration::from_secs(30))?;
                Ok(())
            })
            .unwrap()
        })
        .collect();

    supervisor.cancel();
    for child in children {
        assert_eq!(child.join(), Err(TaskFailure::Cancelled));
    }
}

#[test]
fn test_child_cancel_leaves_supervisor_running() {
    let supervisor = CancellationToken::new();
    let child = run_detached_with("child", &supervisor, |ctx| {
        ctx.sleep(Duration::from_secs(30))?;
        Ok(())
    })
    .unwrap();

    child.cancel();
    assert_eq!(child.join(), Err(TaskFailure::Cancelled));
    assert!(!supervisor.is_cancelled());
}
