use super::models::Config;
use crate::naming::TemplateError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("scheduler.workers must be at least 1")]
    NoWorkers,

    #[error("scheduler.event_capacity must be at least 1")]
    NoEventCapacity,

    #[error("naming.fill must be a single character, got '{0}'")]
    InvalidFill(String),

    #[error("invalid naming template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    #[error("invalid logging.filter '{filter}': {reason}")]
    InvalidLogFilter { filter: String, reason: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_scheduler(config)?;
    validate_naming(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_scheduler(config: &Config) -> Result<(), ValidationError> {
    if config.scheduler.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.scheduler.event_capacity == 0 {
        return Err(ValidationError::NoEventCapacity);
    }
    Ok(())
}

/// The template must build exactly as the handlers will build it
fn validate_naming(config: &Config) -> Result<(), ValidationError> {
    if config.naming.fill_char().is_none() {
        return Err(ValidationError::InvalidFill(config.naming.fill.clone()));
    }
    config.naming.template()?;
    Ok(())
}

fn validate_logging(config: &Config) -> Result<(), ValidationError> {
    EnvFilter::try_new(&config.logging.filter).map_err(|err| ValidationError::InvalidLogFilter {
        filter: config.logging.filter.clone(),
        reason: err.to_string(),
    })?;
    Ok(())
}
