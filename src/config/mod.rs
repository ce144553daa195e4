//! Configuration management for filefx
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use filefx::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Workers: {}", config.scheduler.workers);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FILEFX__<section>__<key>`
//!
//! Examples:
//! - `FILEFX__SCHEDULER__WORKERS=8`
//! - `FILEFX__NAMING__PATTERN=_N`
//! - `FILEFX__LOGGING__FILTER=filefx=debug`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/filefx.toml`.
//! This can be overridden using the `FILEFX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, LoggingConfig, NamingConfig, SchedulerConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FILEFX__*`)
    /// 2. TOML file (default: `config/filefx.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation (no workers, a template without exactly one `N`, ...).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
