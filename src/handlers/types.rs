use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of handling one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Effect committed to disk (or entry matched, for readers)
    Done,
    /// New name computed, nothing written
    Planned,
    /// Left alone by policy (e.g. `DupMode=Ignore`); not a failure
    Skipped,
    Failed(String),
}

/// Progress notification emitted by a running handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HandlerEvent {
    Started {
        handler: String,
        total: Option<usize>,
    },
    Status(String),
    FileHandled {
        input: PathBuf,
        output: Option<PathBuf>,
        outcome: FileOutcome,
    },
    Finished {
        handler: String,
        summary: String,
    },
}

/// Per-invocation counters behind the `Finish, ...` summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Done | FileOutcome::Planned => self.done += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }

    /// `Finish, 3 files copied.` / `Finish, nothing to do.`
    pub fn summary(&self, verb: &str) -> String {
        if self.total() == 0 {
            return "Finish, nothing to do.".to_string();
        }

        let mut line = format!("Finish, {} files {verb}", self.done);
        if self.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        line.push('.');
        line
    }
}
