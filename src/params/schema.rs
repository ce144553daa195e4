use serde::Serialize;
use thiserror::Error;

use super::{ParamValue, ParameterSet};
use crate::naming::TemplateError;
use crate::pattern::PatternError;
use crate::range::RangeError;

/// Rejected before a task is submitted; the task never reaches `Running`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{handler}: missing required parameter '{name}'")]
    MissingParameter { handler: String, name: String },

    #[error("{handler}: unknown parameter '{name}'")]
    UnknownParameter { handler: String, name: String },

    #[error("{handler}: parameter '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        handler: String,
        name: String,
        expected: String,
        found: String,
    },

    #[error("{handler}: parameter '{name}' has unknown value '{value}', expected one of {expected}")]
    UnknownVariant {
        handler: String,
        name: String,
        value: String,
        expected: String,
    },

    #[error("{handler}: parameter '{name}' is invalid: {reason}")]
    InvalidValue {
        handler: String,
        name: String,
        reason: String,
    },

    #[error("unknown handler '{0}'")]
    UnknownHandler(String),

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ValidationError {
    pub fn missing(handler: &str, name: &str) -> Self {
        Self::MissingParameter {
            handler: handler.to_string(),
            name: name.to_string(),
        }
    }
}

/// Declared parameter type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamKind {
    Bool,
    Integer { min: i64, max: i64 },
    Text,
    Path,
    Char,
    Enum { variants: &'static [&'static str] },
}

impl ParamKind {
    fn expected(&self) -> String {
        match self {
            Self::Bool => "a boolean".to_string(),
            Self::Integer { min, max } => format!("an integer in {min}..={max}"),
            Self::Text => "a string".to_string(),
            Self::Path => "a path".to_string(),
            Self::Char => "a single character".to_string(),
            Self::Enum { variants } => format!("one of {}", variants.join("|")),
        }
    }
}

/// One entry of a handler's published parameter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
    pub required: bool,
    #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
        }
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Registration metadata a handler publishes to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerMetadata {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl HandlerMetadata {
    pub fn new(id: &'static str, display_name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            display_name,
            description,
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|spec| spec.name == name)
    }

    /// Check `params` against the declared schema
    ///
    /// Returns a normalized copy: values coerced to their declared kind,
    /// defaults filled in, enum values replaced by the canonical variant name.
    pub fn validate(&self, params: &ParameterSet) -> Result<ParameterSet, ValidationError> {
        if let Some((name, _)) = params.iter().find(|(name, _)| self.spec(name).is_none()) {
            return Err(ValidationError::UnknownParameter {
                handler: self.id.to_string(),
                name: name.to_string(),
            });
        }

        let mut normalized = ParameterSet::new();
        for spec in &self.parameters {
            let value = match (params.get(spec.name), &spec.default) {
                (Some(value), _) => self.coerce(spec, value)?,
                (None, Some(default)) => default.clone(),
                (None, None) if spec.required => {
                    return Err(ValidationError::missing(self.id, spec.name));
                }
                (None, None) => continue,
            };
            normalized.insert(spec.name, value);
        }

        Ok(normalized)
    }

    fn coerce(&self, spec: &ParamSpec, value: &ParamValue) -> Result<ParamValue, ValidationError> {
        let mismatch = || ValidationError::TypeMismatch {
            handler: self.id.to_string(),
            name: spec.name.to_string(),
            expected: spec.kind.expected(),
            found: format!("{} '{}'", value.type_name(), value),
        };
        let invalid = |reason: String| ValidationError::InvalidValue {
            handler: self.id.to_string(),
            name: spec.name.to_string(),
            reason,
        };

        match (&spec.kind, value) {
            (ParamKind::Bool, ParamValue::Bool(flag)) => Ok(ParamValue::Bool(*flag)),
            (ParamKind::Bool, ParamValue::Integer(n @ (0 | 1))) => Ok(ParamValue::Bool(*n == 1)),
            (ParamKind::Bool, ParamValue::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(ParamValue::Bool(true)),
                "false" | "no" | "0" => Ok(ParamValue::Bool(false)),
                _ => Err(mismatch()),
            },
            (ParamKind::Bool, _) => Err(mismatch()),

            (ParamKind::Integer { min, max }, _) => {
                let number = match value {
                    ParamValue::Integer(n) => *n,
                    ParamValue::Text(text) => text.trim().parse().map_err(|_| mismatch())?,
                    ParamValue::Bool(_) => return Err(mismatch()),
                };
                if number < *min || number > *max {
                    return Err(invalid(format!("{number} is outside {min}..={max}")));
                }
                Ok(ParamValue::Integer(number))
            }

            (ParamKind::Text, ParamValue::Text(text)) => Ok(ParamValue::Text(text.clone())),
            (ParamKind::Text, ParamValue::Integer(n)) => Ok(ParamValue::Text(n.to_string())),
            (ParamKind::Text, ParamValue::Bool(_)) => Err(mismatch()),

            (ParamKind::Path, ParamValue::Text(text)) if text.trim().is_empty() => {
                Err(invalid("path must not be empty".to_string()))
            }
            (ParamKind::Path, ParamValue::Text(text)) => Ok(ParamValue::Text(text.clone())),
            (ParamKind::Path, _) => Err(mismatch()),

            (ParamKind::Char, ParamValue::Text(text)) if text.chars().count() == 1 => {
                Ok(ParamValue::Text(text.clone()))
            }
            (ParamKind::Char, ParamValue::Integer(digit @ 0..=9)) => {
                Ok(ParamValue::Text(digit.to_string()))
            }
            (ParamKind::Char, _) => Err(mismatch()),

            (ParamKind::Enum { variants }, _) => {
                let found = match value {
                    ParamValue::Integer(index) => usize::try_from(*index)
                        .ok()
                        .and_then(|index| variants.get(index)),
                    ParamValue::Text(text) => {
                        let text = text.trim();
                        match text.parse::<usize>() {
                            Ok(index) => variants.get(index),
                            Err(_) => variants.iter().find(|v| v.eq_ignore_ascii_case(text)),
                        }
                    }
                    ParamValue::Bool(_) => None,
                };
                found
                    .map(|variant| ParamValue::Text(variant.to_string()))
                    .ok_or_else(|| ValidationError::UnknownVariant {
                        handler: self.id.to_string(),
                        name: spec.name.to_string(),
                        value: value.to_string(),
                        expected: variants.join("|"),
                    })
            }
        }
    }
}
