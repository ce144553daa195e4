//! Name pattern matching shared by search, filter and rename handlers
//!
//! - [`PatternSpec`] - what to match (wildcard, regex or fixed string)
//! - [`Matcher`] - a [`PatternSpec`] compiled once per handler invocation
//! - [`FilterExpr`] - `!`/`&`/`|` combinations of wildcard operands

mod expr;
mod matcher;

pub use expr::FilterExpr;
pub use matcher::Matcher;

use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::params::ParamEnum;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("pattern must not be empty")]
    EmptyPattern,

    #[error("malformed filter expression '{expr}': {reason}")]
    MalformedExpression { expr: String, reason: String },
}

/// Pattern syntax (`Syntax` parameter)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syntax {
    #[default]
    Wildcard,
    Regex,
    FixedString,
}

impl ParamEnum for Syntax {
    const VARIANTS: &'static [&'static str] = &["Wildcard", "Regex", "FixedString"];

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Wildcard),
            1 => Some(Self::Regex),
            2 => Some(Self::FixedString),
            _ => None,
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wildcard => "Wildcard",
            Self::Regex => "Regex",
            Self::FixedString => "FixedString",
        })
    }
}

impl FromStr for Syntax {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_variant(s).ok_or_else(|| PatternError::InvalidPattern {
            pattern: s.to_string(),
            reason: format!("unknown syntax, expected one of {}", Self::VARIANTS.join("|")),
        })
    }
}

/// Description of a name pattern, compiled into a [`Matcher`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct PatternSpec {
    #[builder(default)]
    pub kind: Syntax,
    #[builder(into)]
    pub text: String,
    #[builder(default = true)]
    pub case_sensitive: bool,
    /// Match against the full name instead of the stem
    #[builder(default)]
    pub include_suffix: bool,
}

impl PatternSpec {
    pub fn wildcard(text: impl Into<String>) -> Self {
        Self::builder().text(text).build()
    }

    pub fn compile(&self) -> Result<Matcher, PatternError> {
        Matcher::compile(self)
    }
}
