use bon::bon;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::files::{join_name, split_name};
use crate::params::ParamEnum;

const PLACEHOLDER: char = 'N';
const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const MAX_WIDTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{0}' must contain the placeholder 'N' exactly once")]
    MissingPlaceholder(String),

    #[error("numeric base {0} is outside 2..=36")]
    InvalidBase(u32),

    #[error("width {0} exceeds the maximum of {MAX_WIDTH}")]
    InvalidWidth(usize),
}

/// Where the counter goes relative to the stem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    #[default]
    After,
}

impl ParamEnum for Position {
    const VARIANTS: &'static [&'static str] = &["Before", "After"];

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Before),
            1 => Some(Self::After),
            _ => None,
        }
    }
}

/// How colliding names are disambiguated, e.g. `(N)` -> `report(1).txt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberingTemplate {
    pattern: String,
    position: Position,
    width: usize,
    fill: char,
    base: u32,
    ignore_first: bool,
    include_suffix: bool,
}

#[bon]
impl NumberingTemplate {
    #[builder]
    pub fn new(
        #[builder(into)] pattern: String,
        #[builder(default)] position: Position,
        #[builder(default = 1)] width: usize,
        #[builder(default = '0')] fill: char,
        #[builder(default = 10)] base: u32,
        #[builder(default)] ignore_first: bool,
        #[builder(default)] include_suffix: bool,
    ) -> Result<Self, TemplateError> {
        if pattern.matches(PLACEHOLDER).count() != 1 {
            return Err(TemplateError::MissingPlaceholder(pattern));
        }
        if !(2..=36).contains(&base) {
            return Err(TemplateError::InvalidBase(base));
        }
        if width > MAX_WIDTH {
            return Err(TemplateError::InvalidWidth(width));
        }

        Ok(Self {
            pattern,
            position,
            width,
            fill,
            base,
            ignore_first,
            include_suffix,
        })
    }
}

impl NumberingTemplate {
    /// Template with default formatting (after the stem, width 1, base 10)
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        Self::builder().pattern(pattern).build()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn fill(&self) -> char {
        self.fill
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn include_suffix(&self) -> bool {
        self.include_suffix
    }

    pub fn ignore_first(&self) -> bool {
        self.ignore_first
    }

    pub fn with_ignore_first(mut self, ignore_first: bool) -> Self {
        self.ignore_first = ignore_first;
        self
    }

    /// Counter rendered in the template's base, left-padded to `width`
    pub fn format_counter(&self, mut value: u64) -> String {
        let base = u64::from(self.base);
        let mut digits = Vec::new();
        loop {
            digits.push(DIGITS[(value % base) as usize] as char);
            value /= base;
            if value == 0 {
                break;
            }
        }

        let mut out: String = std::iter::repeat(self.fill)
            .take(self.width.saturating_sub(digits.len()))
            .collect();
        out.extend(digits.iter().rev());
        out
    }

    /// The literal token with the counter substituted, e.g. `(01)`
    pub fn token(&self, counter: u64) -> String {
        self.pattern
            .replacen(PLACEHOLDER, &self.format_counter(counter), 1)
    }

    /// Apply the numbered token to `name`
    pub fn apply(&self, name: &str, counter: u64) -> String {
        let token = self.token(counter);
        let (stem, suffix) = if self.include_suffix {
            (name, None)
        } else {
            split_name(name)
        };

        let numbered = match self.position {
            Position::Before => format!("{token}{stem}"),
            Position::After => format!("{stem}{token}"),
        };
        join_name(&numbered, suffix)
    }
}

impl Default for NumberingTemplate {
    fn default() -> Self {
        Self {
            pattern: "(N)".to_string(),
            position: Position::After,
            width: 1,
            fill: '0',
            base: 10,
            ignore_first: false,
            include_suffix: false,
        }
    }
}

impl fmt::Display for NumberingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, width={}, fill='{}', base={})",
            self.pattern, self.position, self.width, self.fill, self.base
        )
    }
}
