//! Batch file operations built from composable handlers
//!
//! Handlers (search, rename planning, copy, move, delete, ...) transform an
//! ordered batch of files; they compose into pipelines that run as
//! cancellable tasks on a worker pool.

pub mod config;
pub mod engine;
pub mod files;
pub mod fsops;
pub mod handlers;
pub mod naming;
pub mod observability;
pub mod params;
pub mod pattern;
pub mod range;
pub mod scheduler;
