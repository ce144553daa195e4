//! Engine: configuration, handler registry, scheduler and metrics in one place

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::files::FileRef;
use crate::handlers::{Handler, HandlerDefaults, HandlerRegistry, HandlerSpec};
use crate::naming::TemplateError;
use crate::observability::{Metrics, MetricsSnapshot};
use crate::params::ValidationError;
use crate::scheduler::{Scheduler, SchedulerError, TaskId, TaskSnapshot};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid pipeline: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("invalid naming configuration: {0}")]
    Naming(#[from] TemplateError),

    #[error("cannot read input {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct Engine {
    config: Config,
    registry: HandlerRegistry,
    scheduler: Scheduler,
    metrics: Arc<Metrics>,
}

impl Engine {
    /// Build an engine from loaded configuration
    ///
    /// Spawns the scheduler's dispatcher, so this must run inside a tokio
    /// runtime.
    pub fn new(config: Config) -> Result<Self, EngineError> {
        let defaults = HandlerDefaults {
            naming: config.naming.template()?,
        };
        let metrics = Arc::new(Metrics::new());
        let scheduler = Scheduler::new(&config.scheduler, Arc::clone(&metrics));

        info!(
            workers = scheduler.workers(),
            naming = %defaults.naming,
            "engine ready"
        );

        Ok(Self {
            registry: HandlerRegistry::with_defaults(defaults),
            scheduler,
            metrics,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validate every stage's parameters and build the handler tree
    pub fn build(&self, spec: &HandlerSpec) -> Result<Arc<dyn Handler>, EngineError> {
        Ok(spec.build(&self.registry)?)
    }

    /// Validate and queue a pipeline; nothing is queued if validation fails
    pub fn submit(&self, spec: &HandlerSpec, inputs: Vec<FileRef>) -> Result<TaskId, EngineError> {
        let handler = self.build(spec)?;
        debug!(task = %handler.describe(), inputs = inputs.len(), "pipeline validated");
        Ok(self.scheduler.submit(handler, inputs)?)
    }

    /// Stat `paths` and submit them as the pipeline's input
    pub async fn submit_paths(&self, spec: &HandlerSpec, paths: &[PathBuf]) -> Result<TaskId, EngineError> {
        let handler = self.build(spec)?;
        let inputs = stat_inputs(paths).await?;
        Ok(self.scheduler.submit(handler, inputs)?)
    }

    /// Submit and wait for the terminal state
    pub async fn run(&self, spec: &HandlerSpec, inputs: Vec<FileRef>) -> Result<TaskSnapshot, EngineError> {
        let id = self.submit(spec, inputs)?;
        Ok(self.scheduler.wait(id).await?)
    }
}

/// Snapshot the given paths as absolute [`FileRef`]s, in order
pub async fn stat_inputs(paths: &[PathBuf]) -> Result<Vec<FileRef>, EngineError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let input_error = |source| EngineError::Input {
            path: path.clone(),
            source,
        };
        let absolute = std::path::absolute(path).map_err(input_error)?;
        inputs.push(FileRef::stat(&absolute).await.map_err(input_error)?);
    }
    Ok(inputs)
}
