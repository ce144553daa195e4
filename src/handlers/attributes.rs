use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError, describe_with};
use super::types::{FileOutcome, Tally};
use crate::files::FileRef;
use crate::fsops::{self, FsError, WalkOptions};
use crate::params::{HandlerMetadata, ParamKind, ParamSpec, ParameterSet, ValidationError};

/// Sets or clears the read-only and hidden attributes
///
/// With `Recursion=true` directory inputs are handled together with every
/// entry below them, deepest first; links below them are skipped. The output
/// has one entry per input.
#[derive(Debug, Clone)]
pub struct FileModifyAttributeHandler {
    readonly: Option<bool>,
    hidden: Option<bool>,
    recursion: bool,
}

impl FileModifyAttributeHandler {
    pub const ID: &'static str = "FileModifyAttributeHandler";

    pub fn new(readonly: Option<bool>, hidden: Option<bool>, recursion: bool) -> Self {
        Self {
            readonly,
            hidden,
            recursion,
        }
    }

    /// Apply the attributes to one entry, returning its path afterwards
    async fn apply(&self, path: &Path) -> Result<PathBuf, FsError> {
        if let Some(readonly) = self.readonly {
            fsops::set_readonly(path, readonly).await?;
        }
        match self.hidden {
            Some(hidden) => fsops::set_hidden(path, hidden).await,
            None => Ok(path.to_path_buf()),
        }
    }

    async fn apply_reported(&self, ctx: &HandlerContext, tally: &mut Tally, path: &Path) -> Option<PathBuf> {
        ctx.status(format!("Handling: {}", path.display()));
        match self.apply(path).await {
            Ok(updated) => {
                ctx.file(tally, path, Some(&updated), FileOutcome::Done);
                Some(updated)
            }
            Err(err) => {
                ctx.file(tally, path, None, FileOutcome::Failed(err.to_string()));
                None
            }
        }
    }
}

#[async_trait]
impl Handler for FileModifyAttributeHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        let mut fields = Vec::new();
        if let Some(readonly) = self.readonly {
            fields.push(("Readonly", readonly.to_string()));
        }
        if let Some(hidden) = self.hidden {
            fields.push(("Hidden", hidden.to_string()));
        }
        fields.push(("Recursion", self.recursion.to_string()));
        describe_with(Self::ID, &fields)
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, (!self.recursion).then_some(inputs.len()));
        let mut tally = Tally::default();
        let mut outputs = Vec::with_capacity(inputs.len());

        for file in inputs {
            ctx.checkpoint()?;
            let root = file.source_path();

            if self.recursion && file.is_real_dir() {
                let walk = fsops::walk(root, WalkOptions::contents_first()).await?;
                for child in &walk.entries {
                    ctx.checkpoint()?;
                    // permissions would land on the link target outside the tree
                    if child.attributes.symlink {
                        ctx.file(&mut tally, &child.path, None, FileOutcome::Skipped);
                        continue;
                    }
                    self.apply_reported(ctx, &mut tally, &child.path).await;
                }
                for err in walk.errors {
                    ctx.file(&mut tally, &err.path, None, FileOutcome::Failed(err.to_string()));
                }
            }

            let path = self
                .apply_reported(ctx, &mut tally, root)
                .await
                .unwrap_or_else(|| root.to_path_buf());
            outputs.push(file.relocated(path).await);
        }

        ctx.finished(Self::ID, tally.summary("done"));
        Ok(outputs)
    }
}

impl Configurable for FileModifyAttributeHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(Self::ID, "Modify attributes", "Set files readonly or hidden.")
            .param(ParamSpec::optional(
                "Readonly",
                ParamKind::Bool,
                "Set the files to readonly or not.",
            ))
            .param(ParamSpec::optional(
                "Hidden",
                ParamKind::Bool,
                "Set the files to hidden or not.",
            ))
            .param(
                ParamSpec::optional(
                    "Recursion",
                    ParamKind::Bool,
                    "Recursive of all directories to set the attributes, default is false.",
                )
                .with_default(false),
            )
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let readonly = params.flag("Readonly");
        let hidden = params.flag("Hidden");
        if readonly.is_none() && hidden.is_none() {
            return Err(ValidationError::InvalidValue {
                handler: Self::ID.to_string(),
                name: "Readonly".to_string(),
                reason: "set at least one of Readonly or Hidden".to_string(),
            });
        }
        Ok(Self::new(
            readonly,
            hidden,
            params.flag("Recursion").unwrap_or(false),
        ))
    }
}
