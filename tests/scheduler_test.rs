//! Scheduler behavior with real worker tasks

use async_trait::async_trait;
use filefx::config::SchedulerConfig;
use filefx::files::FileRef;
use filefx::handlers::{FileOutcome, Handler, HandlerContext, HandlerError, Tally};
use filefx::observability::Metrics;
use filefx::scheduler::{FailureReason, Scheduler, TaskEventKind, TaskId, TaskState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, Notify};
use tokio::time::{sleep, timeout};

fn scheduler(workers: usize) -> (Scheduler, Arc<Metrics>) {
    let config = SchedulerConfig {
        workers,
        ..SchedulerConfig::default()
    };
    let metrics = Arc::new(Metrics::new());
    (Scheduler::new(&config, Arc::clone(&metrics)), metrics)
}

async fn wait_for_state(scheduler: &Scheduler, id: TaskId, state: TaskState) {
    timeout(Duration::from_secs(5), async {
        while scheduler.snapshot(id).unwrap().state != state {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task never reached the expected state");
}

/// Blocks until released
struct Gate(Arc<Notify>);

#[async_trait]
impl Handler for Gate {
    fn name(&self) -> &'static str {
        "Gate"
    }

    fn describe(&self) -> String {
        "Gate".to_string()
    }

    async fn process(&self, inputs: &[FileRef], _ctx: &HandlerContext) -> Result<Vec<FileRef>, HandlerError> {
        self.0.notified().await;
        Ok(inputs.to_vec())
    }
}

/// Reports `count` files, pausing between each
struct Slow {
    count: usize,
}

#[async_trait]
impl Handler for Slow {
    fn name(&self) -> &'static str {
        "Slow"
    }

    fn describe(&self) -> String {
        format!("Slow(Count={})", self.count)
    }

    async fn process(&self, _inputs: &[FileRef], ctx: &HandlerContext) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(self.name(), Some(self.count));
        let mut tally = Tally::default();
        for index in 0..self.count {
            ctx.checkpoint()?;
            sleep(Duration::from_millis(10)).await;
            let path = PathBuf::from(format!("/virtual/{index}"));
            ctx.file(&mut tally, &path, None, FileOutcome::Done);
        }
        ctx.finished(self.name(), tally.summary("handled"));
        Ok(Vec::new())
    }
}

/// Waits for every sibling to start before returning
struct Rendezvous(Arc<Barrier>);

#[async_trait]
impl Handler for Rendezvous {
    fn name(&self) -> &'static str {
        "Rendezvous"
    }

    fn describe(&self) -> String {
        "Rendezvous".to_string()
    }

    async fn process(&self, _inputs: &[FileRef], _ctx: &HandlerContext) -> Result<Vec<FileRef>, HandlerError> {
        self.0.wait().await;
        Ok(Vec::new())
    }
}

/// Fails the whole task, with one per-file failure first
struct Fatal;

#[async_trait]
impl Handler for Fatal {
    fn name(&self) -> &'static str {
        "Fatal"
    }

    fn describe(&self) -> String {
        "Fatal".to_string()
    }

    async fn process(&self, _inputs: &[FileRef], ctx: &HandlerContext) -> Result<Vec<FileRef>, HandlerError> {
        let mut tally = Tally::default();
        ctx.file(
            &mut tally,
            &PathBuf::from("/virtual/broken"),
            None,
            FileOutcome::Failed("unreadable".to_string()),
        );
        Err(HandlerError::Fatal("disk vanished".to_string()))
    }
}

#[tokio::test]
async fn test_hold_queued_task_behind_busy_worker() {
    let (scheduler, _) = scheduler(1);
    let gate = Arc::new(Notify::new());

    let first = scheduler.submit(Arc::new(Gate(Arc::clone(&gate))), Vec::new()).unwrap();
    wait_for_state(&scheduler, first, TaskState::Running).await;

    let second = scheduler.submit(Arc::new(Slow { count: 1 }), Vec::new()).unwrap();
    scheduler.hold(second).unwrap();
    assert_eq!(scheduler.snapshot(second).unwrap().state, TaskState::Holded);

    gate.notify_one();
    assert_eq!(scheduler.wait(first).await.unwrap().state, TaskState::Succeeded);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.snapshot(second).unwrap().state, TaskState::Holded);

    scheduler.resume(second).unwrap();
    let snapshot = scheduler.wait(second).await.unwrap();
    assert_eq!(snapshot.state, TaskState::Succeeded);
    assert_eq!(snapshot.report.handled, 1);
}

#[tokio::test]
async fn test_cancel_running_task_at_checkpoint() {
    let (scheduler, metrics) = scheduler(1);
    let id = scheduler.submit(Arc::new(Slow { count: 200 }), Vec::new()).unwrap();

    timeout(Duration::from_secs(5), async {
        while scheduler.snapshot(id).unwrap().progress.current < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    scheduler.cancel(id).unwrap();
    let snapshot = scheduler.wait(id).await.unwrap();

    assert_eq!(snapshot.state, TaskState::Failed);
    assert!(snapshot.is_cancelled());
    assert!(snapshot.progress.current >= 2);
    assert!(snapshot.progress.current < 200);
    assert_eq!(snapshot.progress.total, Some(200));
    assert_eq!(snapshot.report.handled, snapshot.progress.current);

    let counters = metrics.snapshot();
    assert_eq!(counters.tasks_cancelled, 1);
    assert_eq!(counters.tasks_failed, 0);
}

#[tokio::test]
async fn test_workers_run_tasks_concurrently() {
    let (scheduler, _) = scheduler(2);
    let barrier = Arc::new(Barrier::new(2));

    let a = scheduler.submit(Arc::new(Rendezvous(Arc::clone(&barrier))), Vec::new()).unwrap();
    let b = scheduler.submit(Arc::new(Rendezvous(Arc::clone(&barrier))), Vec::new()).unwrap();

    let both = async {
        let first = scheduler.wait(a).await.unwrap();
        let second = scheduler.wait(b).await.unwrap();
        (first.state, second.state)
    };
    let states = timeout(Duration::from_secs(5), both)
        .await
        .expect("tasks did not run concurrently");
    assert_eq!(states, (TaskState::Succeeded, TaskState::Succeeded));
}

#[tokio::test]
async fn test_fatal_error_fails_task_with_report() {
    let (scheduler, metrics) = scheduler(1);
    let id = scheduler.submit(Arc::new(Fatal), Vec::new()).unwrap();
    let snapshot = scheduler.wait(id).await.unwrap();

    assert_eq!(snapshot.state, TaskState::Failed);
    assert_eq!(
        snapshot.failure,
        Some(FailureReason::Handler("fatal handler error: disk vanished".to_string()))
    );
    assert_eq!(snapshot.report.failed, 1);
    assert_eq!(snapshot.report.failures[0].reason, "unreadable");
    assert!(snapshot.outputs.is_empty());
    assert_eq!(metrics.snapshot().tasks_failed, 1);
    assert_eq!(metrics.snapshot().files_failed, 1);
}

#[tokio::test]
async fn test_state_events_in_order() {
    let (scheduler, _) = scheduler(1);
    let mut events = scheduler.subscribe();

    let id = scheduler.submit(Arc::new(Slow { count: 3 }), Vec::new()).unwrap();
    scheduler.wait(id).await.unwrap();

    let mut states = Vec::new();
    let mut files = 0;
    timeout(Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            assert_eq!(event.task_id, id);
            match event.kind {
                TaskEventKind::StateChanged(state) => {
                    states.push(state);
                    if state.is_terminal() {
                        break;
                    }
                }
                TaskEventKind::Handler(filefx::handlers::HandlerEvent::FileHandled { .. }) => files += 1,
                TaskEventKind::Handler(_) => {}
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(states, vec![TaskState::Queued, TaskState::Running, TaskState::Succeeded]);
    assert_eq!(files, 3);
}

#[tokio::test]
async fn test_cancelled_task_cannot_be_resumed() {
    let (scheduler, _) = scheduler(1);
    let id = scheduler.submit_held(Arc::new(Slow { count: 1 }), Vec::new()).unwrap();
    scheduler.cancel(id).unwrap();

    let snapshot = scheduler.wait(id).await.unwrap();
    assert!(snapshot.is_cancelled());
    assert!(scheduler.resume(id).is_err());
    assert!(scheduler.cancel(id).is_err());

    let removed = scheduler.remove(id).unwrap();
    assert_eq!(removed.id, id);
    assert!(scheduler.snapshot(id).is_err());
}
