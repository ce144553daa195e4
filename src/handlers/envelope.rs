use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError};
use super::types::{FileOutcome, Tally};
use crate::files::{FileRef, file_name_of, split_name};
use crate::fsops;
use crate::params::{HandlerMetadata, ParameterSet, ValidationError};

/// Wraps each file into a directory named after its stem
///
/// `photos/a.jpg` ends up as `photos/a/a.jpg`. An existing directory of
/// that name is reused; an existing file of that name is a per-file failure.
#[derive(Debug, Clone, Default)]
pub struct FileEnvelopeByDirHandler;

impl FileEnvelopeByDirHandler {
    pub const ID: &'static str = "FileEnvelopeByDirHandler";

    async fn envelope(&self, source: &Path, stem: &str, name: &str) -> Result<PathBuf, String> {
        let parent = source.parent().unwrap_or_else(|| Path::new(""));
        let dir = parent.join(stem);

        match fs::symlink_metadata(&dir).await {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(format!("{} exists and is not a directory", dir.display()));
            }
            Ok(_) => {}
            Err(_) => fsops::create_dir(&dir).await.map_err(|err| err.to_string())?,
        }

        let target = dir.join(name);
        if fsops::exists(&target).await {
            return Err(format!("{} already exists", target.display()));
        }
        fsops::rename_entry(source, &target)
            .await
            .map_err(|err| err.to_string())?;
        Ok(target)
    }
}

#[async_trait]
impl Handler for FileEnvelopeByDirHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        Self::ID.to_string()
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, Some(inputs.len()));
        let mut tally = Tally::default();
        let mut enveloped = Vec::with_capacity(inputs.len());

        for file in inputs {
            ctx.checkpoint()?;
            let source = file.source_path();
            if file.is_dir() {
                ctx.file(&mut tally, source, None, FileOutcome::Skipped);
                continue;
            }
            ctx.status(format!("Enveloping: {}", source.display()));

            let name = file_name_of(source);
            let stem = split_name(&name).0.to_string();
            match self.envelope(source, &stem, &name).await {
                Ok(target) => {
                    ctx.file(&mut tally, source, Some(&target), FileOutcome::Done);
                    enveloped.push(file.relocated(target).await);
                }
                Err(reason) => ctx.file(&mut tally, source, None, FileOutcome::Failed(reason)),
            }
        }

        ctx.finished(Self::ID, tally.summary("enveloped"));
        Ok(enveloped)
    }
}

impl Configurable for FileEnvelopeByDirHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(
            Self::ID,
            "Envelope by folder",
            "Move every file into a new folder named after the file.",
        )
    }

    fn from_params(_params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}
