use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use crate::files::FileRef;
use crate::fsops::FsError;
use crate::params::{HandlerMetadata, ParameterSet, ValidationError};

/// Task-fatal handler errors
///
/// Per-file failures are not errors: they are reported through
/// [`HandlerContext::file`] and aggregated by the task.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("count of files not equals: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("fatal handler error: {0}")]
    Fatal(String),
}

impl From<FsError> for HandlerError {
    fn from(err: FsError) -> Self {
        Self::Io {
            path: err.path,
            source: err.source,
        }
    }
}

impl HandlerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A unit of work over a batch of files
///
/// Implementations own their validated parameters; inputs are borrowed for
/// the duration of the call. Handlers must call [`HandlerContext::checkpoint`]
/// at every per-file boundary.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Registry id, e.g. `FileCopyHandler`
    fn name(&self) -> &'static str;

    /// `Name(Param=value, ...)`
    fn describe(&self) -> String;

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError>;
}

/// A handler the registry can build from a validated [`ParameterSet`]
pub trait Configurable: Handler + Sized + 'static {
    fn metadata() -> HandlerMetadata;

    fn from_params(params: &ParameterSet, defaults: &HandlerDefaults) -> Result<Self, ValidationError>;
}

/// Render `Name(Key=value, ...)` for [`Handler::describe`]
pub fn describe_with(name: &str, fields: &[(&str, String)]) -> String {
    if fields.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    format!("{name}({})", rendered.join(", "))
}
