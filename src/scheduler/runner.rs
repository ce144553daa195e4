//! Dispatcher loop and per-task execution

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::task::{FailureReason, TaskEntry, TaskId, TaskState};
use crate::handlers::{HandlerContext, HandlerError, HandlerEvent, ProgressObserver};
use crate::observability::Metrics;

/// Broadcast to every scheduler subscriber
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub kind: TaskEventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TaskEventKind {
    StateChanged(TaskState),
    Handler(HandlerEvent),
}

/// Shared plumbing between the scheduler front end and its workers
#[derive(Clone)]
pub(crate) struct Runtime {
    pub events: broadcast::Sender<TaskEvent>,
    pub metrics: Arc<Metrics>,
}

impl Runtime {
    pub fn state_changed(&self, id: TaskId, state: TaskState) {
        debug!(task_id = %id, %state, "task state changed");
        // no subscribers is fine
        let _ = self.events.send(TaskEvent {
            task_id: id,
            kind: TaskEventKind::StateChanged(state),
        });
    }
}

/// Feeds handler events into the task record and the broadcast channel
struct TaskObserver {
    entry: Arc<TaskEntry>,
    runtime: Runtime,
}

impl ProgressObserver for TaskObserver {
    fn on_event(&self, event: HandlerEvent) {
        {
            let mut record = self.entry.record();
            match &event {
                HandlerEvent::Started { total, .. } => {
                    let current = record.progress.current;
                    record.progress.total = total.map(|total| current + total);
                }
                HandlerEvent::Status(text) => record.log(text.clone()),
                HandlerEvent::FileHandled { input, outcome, .. } => {
                    record.progress.current += 1;
                    record.report.record(input.clone(), outcome);
                    self.runtime.metrics.file_outcome(outcome);
                }
                HandlerEvent::Finished { summary, .. } => record.log(summary.clone()),
            }
        }

        let _ = self.runtime.events.send(TaskEvent {
            task_id: self.entry.id,
            kind: TaskEventKind::Handler(event),
        });
    }
}

/// Pull queued tasks and run each on its own tokio task, at most `workers`
/// at a time
///
/// Exits once every sender of the queue is gone.
pub(crate) async fn dispatch(
    mut queue: mpsc::UnboundedReceiver<Arc<TaskEntry>>,
    workers: Arc<Semaphore>,
    runtime: Runtime,
) {
    info!(workers = workers.available_permits(), "task dispatcher started");

    while let Some(entry) = queue.recv().await {
        let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
            warn!("worker pool closed, dispatcher stopping");
            break;
        };

        // held, cancelled, or a duplicate after resume
        if let Err(state) = entry.transition(TaskState::Running) {
            debug!(task_id = %entry.id, %state, "dequeued task not runnable, skipped");
            continue;
        }
        runtime.state_changed(entry.id, TaskState::Running);

        let runtime = runtime.clone();
        tokio::spawn(async move {
            run(entry, runtime).await;
            drop(permit);
        });
    }

    info!("task dispatcher stopped");
}

async fn run(entry: Arc<TaskEntry>, runtime: Runtime) {
    info!(task_id = %entry.id, task = %entry.description, inputs = entry.inputs.len(), "task started");

    let observer = Arc::new(TaskObserver {
        entry: Arc::clone(&entry),
        runtime: runtime.clone(),
    });
    let ctx = HandlerContext::new(entry.cancel.clone(), observer);

    // handler panics surface as a JoinError
    let job = {
        let entry = Arc::clone(&entry);
        tokio::spawn(async move { entry.handler.process(&entry.inputs, &ctx).await })
    };

    let result = match job.await {
        Ok(Ok(outputs)) => Ok(outputs),
        Ok(Err(HandlerError::Cancelled)) => Err(FailureReason::Cancelled),
        Ok(Err(err)) => Err(FailureReason::Handler(err.to_string())),
        Err(join_err) => Err(FailureReason::Panicked(join_err.to_string())),
    };

    let (state, failure) = {
        let mut record = entry.record();
        let state = match result {
            Ok(outputs) => {
                record.outputs = outputs;
                TaskState::Succeeded
            }
            Err(reason) => {
                record.log(format!("Failed: {reason}"));
                record.failure = Some(reason);
                TaskState::Failed
            }
        };
        if let Err(from) = entry.transition_locked(&mut record, state) {
            error!(task_id = %entry.id, %from, to = %state, "unexpected task state at completion");
        }
        (state, record.failure.clone())
    };

    match failure {
        None => {
            runtime.metrics.task_succeeded();
            info!(task_id = %entry.id, "task succeeded");
        }
        Some(FailureReason::Cancelled) => {
            runtime.metrics.task_cancelled();
            info!(task_id = %entry.id, "task cancelled");
        }
        Some(reason) => {
            runtime.metrics.task_failed();
            warn!(task_id = %entry.id, %reason, "task failed");
        }
    }
    runtime.state_changed(entry.id, state);
}
