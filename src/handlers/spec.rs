//! Serializable pipeline descriptions
//!
//! ```toml
//! kind = "pipe"
//!
//! [[stages]]
//! kind = "handler"
//! id = "FileSearchHandler"
//! params = { Pattern = "*.log" }
//!
//! [[stages]]
//! kind = "handler"
//! id = "FileDeleteHandler"
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::combinators::{combine, pipe};
use super::registry::HandlerRegistry;
use super::traits::Handler;
use crate::params::{ParameterSet, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HandlerSpec {
    Handler {
        id: String,
        #[serde(default)]
        params: ParameterSet,
    },
    Pipe {
        stages: Vec<HandlerSpec>,
    },
    Combine {
        branches: Vec<HandlerSpec>,
    },
}

impl HandlerSpec {
    pub fn handler(id: impl Into<String>, params: ParameterSet) -> Self {
        Self::Handler {
            id: id.into(),
            params,
        }
    }

    pub fn pipe(stages: impl IntoIterator<Item = HandlerSpec>) -> Self {
        Self::Pipe {
            stages: stages.into_iter().collect(),
        }
    }

    pub fn combine(branches: impl IntoIterator<Item = HandlerSpec>) -> Self {
        Self::Combine {
            branches: branches.into_iter().collect(),
        }
    }

    /// Parse a TOML pipeline document
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Build the handler tree, validating every stage's parameters
    pub fn build(&self, registry: &HandlerRegistry) -> Result<Arc<dyn Handler>, ValidationError> {
        match self {
            Self::Handler { id, params } => registry.build(id, params),
            Self::Pipe { stages } => {
                let built = Self::build_all(stages, registry)?;
                pipe(built).ok_or_else(|| ValidationError::InvalidPipeline("pipe has no stages".to_string()))
            }
            Self::Combine { branches } => {
                let built = Self::build_all(branches, registry)?;
                combine(built)
                    .ok_or_else(|| ValidationError::InvalidPipeline("combine has no branches".to_string()))
            }
        }
    }

    fn build_all(
        specs: &[HandlerSpec],
        registry: &HandlerRegistry,
    ) -> Result<Vec<Arc<dyn Handler>>, ValidationError> {
        specs.iter().map(|spec| spec.build(registry)).collect()
    }
}
