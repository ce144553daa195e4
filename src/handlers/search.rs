use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError, describe_with};
use super::types::{FileOutcome, Tally};
use crate::files::FileRef;
use crate::fsops::{self, WalkOptions};
use crate::params::{HandlerMetadata, ParamEnum, ParamKind, ParamSpec, ParameterSet, ValidationError};
use crate::pattern::{Matcher, PatternError, PatternSpec, Syntax};

/// `Pattern`, `Syntax`, `CaseSensitive`, `SuffixInclude`
pub(super) fn with_pattern_params(metadata: HandlerMetadata, suffix_default: bool) -> HandlerMetadata {
    metadata
        .param(ParamSpec::required("Pattern", ParamKind::Text, "Name pattern to match."))
        .param(
            ParamSpec::optional(
                "Syntax",
                ParamKind::Enum {
                    variants: Syntax::VARIANTS,
                },
                "Pattern syntax: Wildcard, Regex or FixedString.",
            )
            .with_default("Wildcard"),
        )
        .param(
            ParamSpec::optional("CaseSensitive", ParamKind::Bool, "Match case, default is true.")
                .with_default(true),
        )
        .param(
            ParamSpec::optional(
                "SuffixInclude",
                ParamKind::Bool,
                "Match against the full name including the suffix.",
            )
            .with_default(suffix_default),
        )
}

pub(super) fn pattern_from(
    handler: &str,
    params: &ParameterSet,
    suffix_default: bool,
) -> Result<PatternSpec, ValidationError> {
    let text = params
        .text("Pattern")
        .ok_or_else(|| ValidationError::missing(handler, "Pattern"))?;

    Ok(PatternSpec::builder()
        .text(text)
        .kind(params.variant("Syntax").unwrap_or_default())
        .case_sensitive(params.flag("CaseSensitive").unwrap_or(true))
        .include_suffix(params.flag("SuffixInclude").unwrap_or(suffix_default))
        .build())
}

/// Enumerates entries under the input roots whose names match a pattern
///
/// Directory inputs are walked (recursively unless `Recursion=false`); file
/// inputs are tested themselves. Unreadable directories are per-file failures.
#[derive(Debug, Clone)]
pub struct FileSearchHandler {
    pattern: PatternSpec,
    matcher: Matcher,
    recursion: bool,
}

impl FileSearchHandler {
    pub const ID: &'static str = "FileSearchHandler";

    pub fn new(pattern: PatternSpec, recursion: bool) -> Result<Self, PatternError> {
        Ok(Self {
            matcher: pattern.compile()?,
            pattern,
            recursion,
        })
    }
}

#[async_trait]
impl Handler for FileSearchHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(
            Self::ID,
            &[
                ("Pattern", self.pattern.text.clone()),
                ("Syntax", self.pattern.kind.to_string()),
                ("Recursion", self.recursion.to_string()),
            ],
        )
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        debug!(handler = Self::ID, roots = inputs.len(), "search started");
        ctx.started(Self::ID, None);
        ctx.status("Scanning...");

        let mut tally = Tally::default();
        let mut found = Vec::new();

        for root in inputs {
            ctx.checkpoint()?;
            if !root.is_dir() {
                if self.matcher.test(&root.name) {
                    ctx.file(&mut tally, &root.path, Some(&root.path), FileOutcome::Done);
                    found.push(root.clone());
                }
                continue;
            }

            let options = if self.recursion {
                WalkOptions::default()
            } else {
                WalkOptions::children_only()
            };
            let walk = fsops::walk(&root.path, options).await?;

            let mut matching: Option<&Path> = None;
            for entry in &walk.entries {
                ctx.checkpoint()?;
                let dir = entry.parent();
                if matching != Some(dir) {
                    ctx.status(format!("Matching: {}", dir.display()));
                    matching = Some(dir);
                }
                if self.matcher.test(&entry.name) {
                    ctx.file(&mut tally, &entry.path, Some(&entry.path), FileOutcome::Done);
                    found.push(entry.clone());
                }
            }

            for err in walk.errors {
                warn!(path = %err.path.display(), error = %err, "entry not readable");
                ctx.file(&mut tally, &err.path, None, FileOutcome::Failed(err.to_string()));
            }
        }

        ctx.finished(Self::ID, tally.summary("matched"));
        Ok(found)
    }
}

impl Configurable for FileSearchHandler {
    fn metadata() -> HandlerMetadata {
        with_pattern_params(
            HandlerMetadata::new(Self::ID, "Search", "Find files and folders by name."),
            true,
        )
        .param(
            ParamSpec::optional(
                "Recursion",
                ParamKind::Bool,
                "Recursive statistics of all directories, default is true.",
            )
            .with_default(true),
        )
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let pattern = pattern_from(Self::ID, params, true)?;
        Ok(Self::new(pattern, params.flag("Recursion").unwrap_or(true))?)
    }
}
