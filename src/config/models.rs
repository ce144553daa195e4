use serde::{Deserialize, Serialize};

use crate::naming::{NumberingTemplate, Position, TemplateError};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Tasks running at the same time
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Buffered task events per subscriber before the slowest one lags
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_event_capacity() -> usize {
    256
}

/// Default numbering template for duplicate names
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamingConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_width")]
    pub width: usize,
    /// Single padding character
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default = "default_base")]
    pub base: u32,
    #[serde(default)]
    pub first_file_ignored: bool,
    #[serde(default)]
    pub suffix_include: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            position: Position::default(),
            width: default_width(),
            fill: default_fill(),
            base: default_base(),
            first_file_ignored: false,
            suffix_include: false,
        }
    }
}

fn default_pattern() -> String {
    "(N)".to_string()
}

fn default_width() -> usize {
    1
}

fn default_fill() -> String {
    "0".to_string()
}

fn default_base() -> u32 {
    10
}

impl NamingConfig {
    /// The padding character, if `fill` holds exactly one
    pub fn fill_char(&self) -> Option<char> {
        let mut chars = self.fill.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn template(&self) -> Result<NumberingTemplate, TemplateError> {
        NumberingTemplate::builder()
            .pattern(self.pattern.as_str())
            .position(self.position)
            .width(self.width)
            .fill(self.fill_char().unwrap_or('0'))
            .base(self.base)
            .ignore_first(self.first_file_ignored)
            .include_suffix(self.suffix_include)
            .build()
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: default_ansi(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_ansi() -> bool {
    true
}
