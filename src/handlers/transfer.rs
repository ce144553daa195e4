//! Copy and move into a destination directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError, describe_with};
use super::types::{FileOutcome, Tally};
use crate::files::FileRef;
use crate::fsops;
use crate::naming::{NameResolver, NumberingTemplate};
use crate::params::{HandlerMetadata, ParamEnum, ParamKind, ParamSpec, ParameterSet, ValidationError};

/// Policy for a name that already exists at the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DupMode {
    #[default]
    Rename,
    Overwrite,
    Ignore,
}

impl ParamEnum for DupMode {
    const VARIANTS: &'static [&'static str] = &["Rename", "Overwrite", "Ignore"];

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Rename),
            1 => Some(Self::Overwrite),
            2 => Some(Self::Ignore),
            _ => None,
        }
    }
}

fn destination_dir(dest: &Path) -> Result<PathBuf, HandlerError> {
    std::path::absolute(dest).map_err(|source| HandlerError::Io {
        path: dest.to_path_buf(),
        source,
    })
}

fn dest_path_param(handler: &str, params: &ParameterSet) -> Result<PathBuf, ValidationError> {
    params
        .path("DestPath")
        .ok_or_else(|| ValidationError::missing(handler, "DestPath"))
}

/// A directory cannot be copied or moved into itself
fn nested_in_source(source: &Path, target: &Path) -> bool {
    target != source && target.starts_with(source)
}

/// Copies inputs into `DestPath`
///
/// Each output is named after the input's (possibly planned) name. In
/// `Rename` mode collisions are numbered with the configured template and
/// re-checked right before writing.
#[derive(Debug, Clone)]
pub struct FileCopyHandler {
    dest: PathBuf,
    mode: DupMode,
    template: NumberingTemplate,
}

impl FileCopyHandler {
    pub const ID: &'static str = "FileCopyHandler";

    pub fn new(dest: impl Into<PathBuf>, mode: DupMode, template: NumberingTemplate) -> Self {
        Self {
            dest: dest.into(),
            mode,
            // everything already at the destination counts as a collision
            template: template.with_ignore_first(false),
        }
    }

    /// Final name for `name`, or `None` when the file is to be skipped
    async fn target_name(&self, resolver: &mut NameResolver<'_>, dest: &Path, name: &str) -> Option<String> {
        match self.mode {
            DupMode::Rename => {
                let mut candidate = resolver.claim(name);
                while fsops::exists(&dest.join(&candidate)).await {
                    resolver.reserve(candidate);
                    candidate = resolver.claim(name);
                }
                Some(candidate)
            }
            DupMode::Overwrite => Some(name.to_string()),
            DupMode::Ignore => {
                if fsops::exists(&dest.join(name)).await {
                    None
                } else {
                    Some(name.to_string())
                }
            }
        }
    }

    async fn copy_one(&self, source: &Path, target: &Path) -> Result<(), String> {
        if nested_in_source(source, target) {
            return Err("cannot copy a directory into itself".to_string());
        }
        if fsops::exists(target).await {
            if fsops::same_entry(source, target).await {
                return Err("source and destination are the same".to_string());
            }
            // a file over a file or a tree into a tree is overwritten in place
            if !fsops::same_kind(source, target).await {
                fsops::remove_entry(target).await.map_err(|err| err.to_string())?;
            }
        }
        fsops::copy_entry(source, target).await.map_err(|err| err.to_string())
    }
}

#[async_trait]
impl Handler for FileCopyHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(
            Self::ID,
            &[
                ("DestPath", self.dest.display().to_string()),
                ("DupMode", format!("{:?}", self.mode)),
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
        let mut copied = Vec::with_capacity(inputs.len());

        if !inputs.is_empty() {
            let dest = destination_dir(&self.dest)?;
            fsops::create_dir(&dest).await?;
            let existing = fsops::list_names(&dest).await?;
            let mut resolver = NameResolver::new(&self.template, existing);
            info!(handler = Self::ID, dest = %dest.display(), files = inputs.len(), "copy started");

            for file in inputs {
                ctx.checkpoint()?;
                let source = file.source_path();
                ctx.status(format!("Copying: {}", source.display()));

                if !fsops::exists(source).await {
                    ctx.file(&mut tally, source, None, FileOutcome::Failed("source no longer exists".to_string()));
                    continue;
                }

                let Some(name) = self.target_name(&mut resolver, &dest, &file.name).await else {
                    debug!(source = %source.display(), "destination exists, skipped");
                    ctx.file(&mut tally, source, None, FileOutcome::Skipped);
                    continue;
                };

                let target = dest.join(&name);
                match self.copy_one(source, &target).await {
                    Ok(()) => {
                        ctx.file(&mut tally, source, Some(&target), FileOutcome::Done);
                        copied.push(file.relocated(target).await);
                    }
                    Err(reason) => ctx.file(&mut tally, source, None, FileOutcome::Failed(reason)),
                }
            }
        }

        ctx.finished(Self::ID, tally.summary("copied"));
        Ok(copied)
    }
}

impl Configurable for FileCopyHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(Self::ID, "Copy", "Copy files into a directory.")
            .param(ParamSpec::required(
                "DestPath",
                ParamKind::Path,
                "Target directory for files copying.",
            ))
            .param(
                ParamSpec::optional(
                    "DupMode",
                    ParamKind::Enum {
                        variants: DupMode::VARIANTS,
                    },
                    "How to handle duplicate files, 0: rename, 1: overwrite, 2: ignored.",
                )
                .with_default("Rename"),
            )
    }

    fn from_params(params: &ParameterSet, defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        Ok(Self::new(
            dest_path_param(Self::ID, params)?,
            params.variant("DupMode").unwrap_or_default(),
            defaults.naming.clone(),
        ))
    }
}

/// Moves inputs into `DestPath`
///
/// A rename on the same volume, copy and delete across volumes. Without
/// `Overwrite` an existing destination is a per-file failure.
#[derive(Debug, Clone)]
pub struct FileMoveHandler {
    dest: PathBuf,
    overwrite: bool,
}

impl FileMoveHandler {
    pub const ID: &'static str = "FileMoveHandler";

    pub fn new(dest: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dest: dest.into(),
            overwrite,
        }
    }

    async fn move_one(&self, source: &Path, target: &Path) -> Result<FileOutcome, String> {
        if !fsops::exists(source).await {
            return Err("source no longer exists".to_string());
        }
        if source == target || fsops::same_entry(source, target).await {
            return Ok(FileOutcome::Skipped);
        }
        if nested_in_source(source, target) {
            return Err("cannot move a directory into itself".to_string());
        }
        if fsops::exists(target).await {
            if !self.overwrite {
                return Err(format!("{} already exists", target.display()));
            }
            fsops::remove_entry(target).await.map_err(|err| err.to_string())?;
        }
        fsops::move_entry(source, target)
            .await
            .map(|()| FileOutcome::Done)
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl Handler for FileMoveHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(
            Self::ID,
            &[
                ("DestPath", self.dest.display().to_string()),
                ("Overwrite", self.overwrite.to_string()),
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
        let mut moved = Vec::with_capacity(inputs.len());

        if !inputs.is_empty() {
            let dest = destination_dir(&self.dest)?;
            fsops::create_dir(&dest).await?;
            info!(handler = Self::ID, dest = %dest.display(), files = inputs.len(), "move started");

            for file in inputs {
                ctx.checkpoint()?;
                let source = file.source_path();
                ctx.status(format!("Moving: {}", source.display()));

                let target = dest.join(&file.name);
                match self.move_one(source, &target).await {
                    Ok(outcome) => {
                        ctx.file(&mut tally, source, Some(&target), outcome);
                        moved.push(file.relocated(target).await);
                    }
                    Err(reason) => ctx.file(&mut tally, source, None, FileOutcome::Failed(reason)),
                }
            }
        }

        ctx.finished(Self::ID, tally.summary("moved"));
        Ok(moved)
    }
}

impl Configurable for FileMoveHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(Self::ID, "Move", "Move files into a directory.")
            .param(ParamSpec::required(
                "DestPath",
                ParamKind::Path,
                "Target directory for files moving.",
            ))
            .param(
                ParamSpec::optional(
                    "Overwrite",
                    ParamKind::Bool,
                    "Is it overwrite the existing file, default is false.",
                )
                .with_default(false),
            )
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        Ok(Self::new(
            dest_path_param(Self::ID, params)?,
            params.flag("Overwrite").unwrap_or(false),
        ))
    }
}
