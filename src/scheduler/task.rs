use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use uuid::Uuid;

use super::CancelToken;
use crate::files::FileRef;
use crate::handlers::{FileOutcome, Handler};

/// Task identifier; v7 UUIDs sort by submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Task lifecycle
///
/// `Queued -> (Holded <-> Queued)* -> Running -> Succeeded | Failed`.
/// Queued and held tasks may also be cancelled straight to `Failed`.
/// `Unknown` is never entered; it only exists so a state read from
/// outside can be reported, and counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Holded,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Unknown)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Unknown)
    }

    pub fn can_transition(self, to: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, to),
            (Queued, Holded)
                | (Queued, Running)
                | (Queued, Failed)
                | (Holded, Queued)
                | (Holded, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Holded => "holded",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        })
    }
}

/// Why a task ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    Handler(String),
    Panicked(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Handler(message) => f.write_str(message),
            Self::Panicked(message) => write!(f, "handler panicked: {message}"),
        }
    }
}

/// Files processed so far; `total` is unknown for open-ended walks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Per-file outcomes aggregated over every stage of the task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub handled: usize,
    pub planned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FileFailure>,
}

impl TaskReport {
    pub(crate) fn record(&mut self, input: PathBuf, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Done => self.handled += 1,
            FileOutcome::Planned => self.planned += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(FileFailure {
                    path: input,
                    reason: reason.clone(),
                });
            }
        }
    }
}

/// Point-in-time copy of a task for the host
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub description: String,
    pub state: TaskState,
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    pub messages: Vec<TaskMessage>,
    pub report: TaskReport,
    pub outputs: Vec<FileRef>,
    pub elapsed_ms: Option<i64>,
}

impl TaskSnapshot {
    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(FailureReason::Cancelled)
    }
}

#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub state: TaskState,
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    pub messages: Vec<TaskMessage>,
    pub report: TaskReport,
    pub outputs: Vec<FileRef>,
}

impl TaskRecord {
    pub fn log(&mut self, text: impl Into<String>) {
        self.messages.push(TaskMessage {
            at: Utc::now(),
            text: text.into(),
        });
    }
}

/// Scheduler-owned task: the handler, its inputs and the mutable record
pub(crate) struct TaskEntry {
    pub id: TaskId,
    pub handler: Arc<dyn Handler>,
    pub inputs: Vec<FileRef>,
    pub description: String,
    pub cancel: CancelToken,
    record: Mutex<TaskRecord>,
    state_tx: watch::Sender<TaskState>,
}

impl TaskEntry {
    pub fn new(handler: Arc<dyn Handler>, inputs: Vec<FileRef>) -> Self {
        let (state_tx, _) = watch::channel(TaskState::Queued);
        Self {
            id: TaskId::new(),
            description: handler.describe(),
            handler,
            inputs,
            cancel: CancelToken::new(),
            record: Mutex::new(TaskRecord {
                state: TaskState::Queued,
                failure: None,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
                progress: Progress::default(),
                messages: Vec::new(),
                report: TaskReport::default(),
                outputs: Vec::new(),
            }),
            state_tx,
        }
    }

    /// Lock the record, recovering from a poisoned lock
    pub fn record(&self) -> MutexGuard<'_, TaskRecord> {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> TaskState {
        self.record().state
    }

    /// Move to `to` if the state machine allows it, returning the previous state
    pub fn transition(&self, to: TaskState) -> Result<TaskState, TaskState> {
        let mut record = self.record();
        self.transition_locked(&mut record, to)
    }

    pub fn transition_locked(&self, record: &mut TaskRecord, to: TaskState) -> Result<TaskState, TaskState> {
        let from = record.state;
        if !from.can_transition(to) {
            return Err(from);
        }
        record.state = to;
        match to {
            TaskState::Running => record.started_at = Some(Utc::now()),
            state if state.is_terminal() => record.finished_at = Some(Utc::now()),
            _ => {}
        }
        self.state_tx.send_replace(to);
        Ok(from)
    }

    pub fn watch(&self) -> watch::Receiver<TaskState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let record = self.record();
        let elapsed_ms = record.started_at.map(|started| {
            let end = record.finished_at.unwrap_or_else(Utc::now);
            (end - started).num_milliseconds()
        });

        TaskSnapshot {
            id: self.id,
            description: self.description.clone(),
            state: record.state,
            failure: record.failure.clone(),
            created_at: record.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            progress: record.progress,
            messages: record.messages.clone(),
            report: record.report.clone(),
            outputs: record.outputs.clone(),
            elapsed_ms,
        }
    }
}
