use std::path::Path;
use std::sync::Arc;

use super::traits::HandlerError;
use super::types::{FileOutcome, HandlerEvent, Tally};
use crate::files::FileRef;
use crate::scheduler::CancelToken;

/// Receives progress from running handlers
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: HandlerEvent);
}

/// Observer that drops every event
#[derive(Debug, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_event(&self, _event: HandlerEvent) {}
}

/// Per-invocation context shared by all stages of a pipeline
#[derive(Clone)]
pub struct HandlerContext {
    cancel: CancelToken,
    observer: Arc<dyn ProgressObserver>,
    originals: Option<Arc<[FileRef]>>,
}

impl HandlerContext {
    pub fn new(cancel: CancelToken, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            cancel,
            observer,
            originals: None,
        }
    }

    /// Context with no observer and a token nobody else holds
    pub fn detached() -> Self {
        Self::new(CancelToken::new(), Arc::new(NullObserver))
    }

    /// Input of the enclosing pipe stage, if any
    pub fn originals(&self) -> Option<&[FileRef]> {
        self.originals.as_deref()
    }

    pub(crate) fn with_originals(&self, originals: Arc<[FileRef]>) -> Self {
        Self {
            cancel: self.cancel.clone(),
            observer: Arc::clone(&self.observer),
            originals: Some(originals),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Per-file cancellation checkpoint
    pub fn checkpoint(&self) -> Result<(), HandlerError> {
        if self.cancel.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn emit(&self, event: HandlerEvent) {
        self.observer.on_event(event);
    }

    pub fn started(&self, handler: &str, total: Option<usize>) {
        self.emit(HandlerEvent::Started {
            handler: handler.to_string(),
            total,
        });
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(HandlerEvent::Status(text.into()));
    }

    /// Report one file and count it in `tally`
    pub fn file(&self, tally: &mut Tally, input: &Path, output: Option<&Path>, outcome: FileOutcome) {
        tally.record(&outcome);
        self.emit(HandlerEvent::FileHandled {
            input: input.to_path_buf(),
            output: output.map(Path::to_path_buf),
            outcome,
        });
    }

    pub fn finished(&self, handler: &str, summary: String) {
        self.emit(HandlerEvent::Finished {
            handler: handler.to_string(),
            summary,
        });
    }
}
