//! Task scheduler
//!
//! Wraps a handler and its inputs into a [`TaskId`]-addressed task and runs
//! queued tasks on a bounded worker pool:
//!
//! 1. `submit` registers the task as `Queued` and pushes it onto an mpsc queue
//! 2. The dispatcher waits for a free worker permit, then starts the task
//!    unless it was held or cancelled in the meantime
//! 3. Handler events update the task record and are broadcast as [`TaskEvent`]s
//! 4. The task ends `Succeeded` or `Failed`; waiters are woken through a
//!    watch channel
//!
//! Tasks run concurrently with no ordering between them; inside one task
//! files are handled in input order.

mod cancel;
mod runner;
mod task;

pub use cancel::CancelToken;
pub use runner::{TaskEvent, TaskEventKind};
pub use task::{
    FailureReason, FileFailure, Progress, TaskId, TaskMessage, TaskReport, TaskSnapshot, TaskState,
};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::files::FileRef;
use crate::handlers::Handler;
use crate::observability::Metrics;
use runner::Runtime;
use task::TaskEntry;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition { from: TaskState, to: TaskState },

    #[error("task {0} has not finished")]
    NotFinished(TaskId),

    #[error("scheduler is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Owns every submitted task until it is removed
///
/// Must be created inside a tokio runtime: construction spawns the
/// dispatcher, which stops once the scheduler is dropped.
pub struct Scheduler {
    tasks: Mutex<BTreeMap<TaskId, Arc<TaskEntry>>>,
    queue: mpsc::UnboundedSender<Arc<TaskEntry>>,
    runtime: Runtime,
    closed: AtomicBool,
    workers: usize,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig, metrics: Arc<Metrics>) -> Self {
        let workers = config.workers.max(1);
        let (queue, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let runtime = Runtime { events, metrics };

        tokio::spawn(runner::dispatch(
            receiver,
            Arc::new(Semaphore::new(workers)),
            runtime.clone(),
        ));

        info!(workers, "scheduler started");
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            queue,
            runtime,
            closed: AtomicBool::new(false),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn tasks(&self) -> MutexGuard<'_, BTreeMap<TaskId, Arc<TaskEntry>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry(&self, id: TaskId) -> Result<Arc<TaskEntry>> {
        self.tasks()
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::NotFound(id))
    }

    fn enqueue(&self, entry: Arc<TaskEntry>) -> Result<()> {
        self.queue
            .send(entry)
            .map_err(|_| SchedulerError::ShuttingDown)
    }

    fn register(&self, handler: Arc<dyn Handler>, inputs: Vec<FileRef>) -> Result<Arc<TaskEntry>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SchedulerError::ShuttingDown);
        }
        let entry = Arc::new(TaskEntry::new(handler, inputs));
        self.tasks().insert(entry.id, Arc::clone(&entry));
        self.runtime.metrics.task_submitted();
        info!(task_id = %entry.id, task = %entry.description, inputs = entry.inputs.len(), "task submitted");
        self.runtime.state_changed(entry.id, TaskState::Queued);
        Ok(entry)
    }

    /// Queue `handler` to run over `inputs`
    pub fn submit(&self, handler: Arc<dyn Handler>, inputs: Vec<FileRef>) -> Result<TaskId> {
        let entry = self.register(handler, inputs)?;
        let id = entry.id;
        self.enqueue(entry)?;
        Ok(id)
    }

    /// Submit a task that waits in `Holded` until [`resume`](Self::resume)d
    pub fn submit_held(&self, handler: Arc<dyn Handler>, inputs: Vec<FileRef>) -> Result<TaskId> {
        let entry = self.register(handler, inputs)?;
        let id = entry.id;
        self.transition(&entry, TaskState::Holded)?;
        Ok(id)
    }

    fn transition(&self, entry: &TaskEntry, to: TaskState) -> Result<()> {
        entry
            .transition(to)
            .map_err(|from| SchedulerError::InvalidTransition { from, to })?;
        self.runtime.state_changed(entry.id, to);
        Ok(())
    }

    /// Pause a queued task; running tasks cannot be held
    pub fn hold(&self, id: TaskId) -> Result<()> {
        let entry = self.entry(id)?;
        self.transition(&entry, TaskState::Holded)?;
        debug!(task_id = %id, "task held");
        Ok(())
    }

    /// Put a held task back in the queue
    pub fn resume(&self, id: TaskId) -> Result<()> {
        let entry = self.entry(id)?;
        self.transition(&entry, TaskState::Queued)?;
        debug!(task_id = %id, "task resumed");
        self.enqueue(entry)
    }

    /// Request cancellation
    ///
    /// A queued or held task fails immediately. A running task fails with
    /// [`FailureReason::Cancelled`] at its handler's next per-file
    /// checkpoint; files already processed stay processed.
    pub fn cancel(&self, id: TaskId) -> Result<()> {
        let entry = self.entry(id)?;
        entry.cancel.cancel();

        let mut record = entry.record();
        match record.state {
            TaskState::Queued | TaskState::Holded => {
                record.failure = Some(FailureReason::Cancelled);
                record.log("Failed: cancelled");
                entry
                    .transition_locked(&mut record, TaskState::Failed)
                    .map_err(|from| SchedulerError::InvalidTransition {
                        from,
                        to: TaskState::Failed,
                    })?;
                drop(record);
                self.runtime.metrics.task_cancelled();
                self.runtime.state_changed(id, TaskState::Failed);
                info!(task_id = %id, "task cancelled before start");
                Ok(())
            }
            TaskState::Running => {
                info!(task_id = %id, "cancellation requested");
                Ok(())
            }
            from => Err(SchedulerError::InvalidTransition {
                from,
                to: TaskState::Failed,
            }),
        }
    }

    pub fn snapshot(&self, id: TaskId) -> Result<TaskSnapshot> {
        Ok(self.entry(id)?.snapshot())
    }

    /// Every known task, oldest first
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let entries: Vec<Arc<TaskEntry>> = self.tasks().values().cloned().collect();
        entries.iter().map(|entry| entry.snapshot()).collect()
    }

    /// Wait until the task reaches a terminal state
    pub async fn wait(&self, id: TaskId) -> Result<TaskSnapshot> {
        let entry = self.entry(id)?;
        let mut state = entry.watch();
        // the sender lives in the entry we hold, so the channel cannot close
        let _ = state.wait_for(|state| state.is_terminal()).await;
        Ok(entry.snapshot())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.runtime.events.subscribe()
    }

    /// Forget a finished task
    pub fn remove(&self, id: TaskId) -> Result<TaskSnapshot> {
        let mut tasks = self.tasks();
        let entry = tasks.get(&id).ok_or(SchedulerError::NotFound(id))?;
        if !entry.state().is_terminal() {
            return Err(SchedulerError::NotFinished(id));
        }
        let snapshot = entry.snapshot();
        tasks.remove(&id);
        Ok(snapshot)
    }

    /// Forget every finished task, returning how many were dropped
    pub fn clear_finished(&self) -> usize {
        let mut tasks = self.tasks();
        let before = tasks.len();
        tasks.retain(|_, entry| !entry.state().is_terminal());
        before - tasks.len()
    }

    /// Refuse new work and cancel everything still pending or running
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let ids: Vec<TaskId> = self.tasks().keys().copied().collect();
        for id in ids {
            // finished tasks reject cancellation, nothing to do for them
            let _ = self.cancel(id);
        }
        info!("scheduler shutting down");
    }
}
