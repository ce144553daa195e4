//! Pure rename planners
//!
//! Nothing here touches the disk: each output carries the planned path and
//! keeps the on-disk source in `origin`, so a plan can be previewed or
//! chained before [`FileRenameHandler`](super::FileRenameHandler) commits it.

use async_trait::async_trait;
use std::path::is_separator;

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::search::{pattern_from, with_pattern_params};
use super::traits::{Configurable, Handler, HandlerError, describe_with};
use super::types::{FileOutcome, Tally};
use crate::files::{FileRef, join_name, split_name};
use crate::params::{HandlerMetadata, ParamEnum, ParamKind, ParamSpec, ParameterSet, ValidationError};
use crate::pattern::{Matcher, PatternError, PatternSpec};

/// Reason a planned name cannot be used, if any
pub(super) fn invalid_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("planned name is empty")
    } else if name == "." || name == ".." {
        Some("planned name is a relative path")
    } else if name.chars().any(is_separator) {
        Some("planned name contains a path separator")
    } else {
        None
    }
}

/// Emit the plan for one file and return the planned entry
///
/// An unusable name is a per-file failure; the file passes through
/// unchanged so downstream 1:1 stages keep their correspondence.
pub(super) fn plan(ctx: &HandlerContext, tally: &mut Tally, file: &FileRef, new_name: &str) -> FileRef {
    if let Some(reason) = invalid_name(new_name) {
        ctx.file(tally, &file.path, None, FileOutcome::Failed(reason.to_string()));
        return file.clone();
    }

    let planned = file.renamed(new_name);
    ctx.file(tally, file.source_path(), Some(&planned.path), FileOutcome::Planned);
    planned
}

/// Replaces pattern matches inside names
#[derive(Debug, Clone)]
pub struct FileNameReplaceByExpHandler {
    pattern: PatternSpec,
    matcher: Matcher,
    replacement: String,
}

impl FileNameReplaceByExpHandler {
    pub const ID: &'static str = "FileNameReplaceByExpHandler";

    pub fn new(pattern: PatternSpec, replacement: impl Into<String>) -> Result<Self, PatternError> {
        Ok(Self {
            matcher: pattern.compile()?,
            pattern,
            replacement: replacement.into(),
        })
    }
}

#[async_trait]
impl Handler for FileNameReplaceByExpHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(
            Self::ID,
            &[
                ("Pattern", self.pattern.text.clone()),
                ("Replace", self.replacement.clone()),
                ("Syntax", self.pattern.kind.to_string()),
            ],
        )
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, Some(inputs.len()));
        let mut tally = Tally::default();
        let mut planned = Vec::with_capacity(inputs.len());

        for file in inputs {
            ctx.checkpoint()?;
            let new_name = self.matcher.replace(&file.name, &self.replacement);
            planned.push(plan(ctx, &mut tally, file, &new_name));
        }

        ctx.finished(Self::ID, tally.summary("renamed"));
        Ok(planned)
    }
}

impl Configurable for FileNameReplaceByExpHandler {
    fn metadata() -> HandlerMetadata {
        with_pattern_params(
            HandlerMetadata::new(
                Self::ID,
                "Replace by expression",
                "Plan new names by replacing pattern matches.",
            ),
            false,
        )
        .param(
            ParamSpec::optional(
                "Replace",
                ParamKind::Text,
                "Replacement text; regex syntax may use $1 style groups.",
            )
            .with_default(""),
        )
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let pattern = pattern_from(Self::ID, params, false)?;
        Ok(Self::new(pattern, params.text("Replace").unwrap_or_default())?)
    }
}

/// Target letter case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterCase {
    Upper,
    Lower,
}

impl ParamEnum for LetterCase {
    const VARIANTS: &'static [&'static str] = &["Upper", "Lower"];

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Upper),
            1 => Some(Self::Lower),
            _ => None,
        }
    }
}

/// Upper- or lower-cases names
#[derive(Debug, Clone)]
pub struct CaseTransformHandler {
    case: LetterCase,
    include_suffix: bool,
}

impl CaseTransformHandler {
    pub const ID: &'static str = "CaseTransformHandler";

    pub fn new(case: LetterCase, include_suffix: bool) -> Self {
        Self {
            case,
            include_suffix,
        }
    }

    fn transform(&self, file: &FileRef) -> String {
        let (subject, suffix) = if self.include_suffix || file.is_dir() {
            (file.name.as_str(), None)
        } else {
            split_name(&file.name)
        };
        let converted = match self.case {
            LetterCase::Upper => subject.to_uppercase(),
            LetterCase::Lower => subject.to_lowercase(),
        };
        join_name(&converted, suffix)
    }
}

#[async_trait]
impl Handler for CaseTransformHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(
            Self::ID,
            &[
                ("Case", format!("{:?}", self.case)),
                ("SuffixInclude", self.include_suffix.to_string()),
            ],
        )
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, Some(inputs.len()));
        let mut tally = Tally::default();
        let mut planned = Vec::with_capacity(inputs.len());

        for file in inputs {
            ctx.checkpoint()?;
            let new_name = self.transform(file);
            planned.push(plan(ctx, &mut tally, file, &new_name));
        }

        ctx.finished(Self::ID, tally.summary("renamed"));
        Ok(planned)
    }
}

impl Configurable for CaseTransformHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(Self::ID, "Case transform", "Plan upper- or lower-case names.")
            .param(ParamSpec::required(
                "Case",
                ParamKind::Enum {
                    variants: LetterCase::VARIANTS,
                },
                "Upper or Lower.",
            ))
            .param(
                ParamSpec::optional(
                    "SuffixInclude",
                    ParamKind::Bool,
                    "Transform the suffix as well.",
                )
                .with_default(false),
            )
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let case = params
            .variant("Case")
            .ok_or_else(|| ValidationError::missing(Self::ID, "Case"))?;
        Ok(Self::new(case, params.flag("SuffixInclude").unwrap_or(false)))
    }
}
