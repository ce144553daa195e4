//! Handler system
//!
//! A handler transforms an ordered batch of [`FileRef`](crate::files::FileRef)s
//! into a new batch. Planners (rename, case, duplicate) only compute new
//! names; effectful handlers (copy, move, delete, ...) touch the disk.
//!
//! ## Key Components
//!
//! - [`Handler`] - The batch transform contract
//! - [`Configurable`] - Handlers the registry can build from parameters
//! - [`HandlerRegistry`] - Built-in handlers by id, with their metadata
//! - [`HandlerContext`] - Cancellation token, progress observer, pipe originals
//! - [`Pipe`] / [`Combine`] - Sequential and fan-out composition
//! - [`HandlerSpec`] - Serializable pipeline descriptions
//!
//! ## Example
//!
//! ```rust,ignore
//! use filefx::handlers::{HandlerContext, HandlerRegistry};
//! use filefx::params::ParameterSet;
//!
//! let registry = HandlerRegistry::default();
//! let search = registry.build("FileSearchHandler", &ParameterSet::new().with("Pattern", "*.tmp"))?;
//! let found = search.process(&roots, &HandlerContext::detached()).await?;
//! ```

mod attributes;
mod combinators;
mod commit;
mod context;
mod delete;
mod duplicate;
mod envelope;
mod filter;
mod registry;
mod rename;
mod search;
mod spec;
mod traits;
mod transfer;
pub(crate) mod types;

pub use attributes::FileModifyAttributeHandler;
pub use combinators::{Combine, Pipe, combine, pipe};
pub use commit::FileRenameHandler;
pub use context::{HandlerContext, NullObserver, ProgressObserver};
pub use delete::{ClearFolderHandler, FileDeleteHandler};
pub use duplicate::DuplicateHandler;
pub use envelope::FileEnvelopeByDirHandler;
pub use filter::{FileFilterHandler, FileSelectRangeHandler};
pub use registry::{HandlerDefaults, HandlerRegistry};
pub use rename::{CaseTransformHandler, FileNameReplaceByExpHandler, LetterCase};
pub use search::FileSearchHandler;
pub use spec::HandlerSpec;
pub use traits::{Configurable, Handler, HandlerError, describe_with};
pub use transfer::{DupMode, FileCopyHandler, FileMoveHandler};
pub use types::{FileOutcome, HandlerEvent, Tally};
