use async_trait::async_trait;
use tracing::{info, warn};

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError};
use super::types::{FileOutcome, Tally};
use crate::files::FileRef;
use crate::fsops::{self, WalkOptions};
use crate::params::{HandlerMetadata, ParameterSet, ValidationError};

/// Removes every input from disk, directories with their contents
///
/// Irreversible. Nothing survives, so the output is always empty.
#[derive(Debug, Clone, Default)]
pub struct FileDeleteHandler;

impl FileDeleteHandler {
    pub const ID: &'static str = "FileDeleteHandler";
}

#[async_trait]
impl Handler for FileDeleteHandler {
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

        for file in inputs {
            ctx.checkpoint()?;
            let path = file.source_path();
            ctx.status(format!("Deleting: {}", path.display()));

            let outcome = match fsops::remove_entry(path).await {
                Ok(()) => FileOutcome::Done,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "delete failed");
                    FileOutcome::Failed(err.to_string())
                }
            };
            ctx.file(&mut tally, path, None, outcome);
        }

        info!(handler = Self::ID, deleted = tally.done, failed = tally.failed, "delete finished");
        ctx.finished(Self::ID, tally.summary("deleted"));
        Ok(Vec::new())
    }
}

impl Configurable for FileDeleteHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(Self::ID, "Delete", "Delete files and folders permanently.")
    }

    fn from_params(_params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}

/// Deletes every file below each input directory, keeping the directories
///
/// Non-directory inputs are skipped. The cleared directories are the output.
#[derive(Debug, Clone, Default)]
pub struct ClearFolderHandler;

impl ClearFolderHandler {
    pub const ID: &'static str = "ClearFolderHandler";
}

#[async_trait]
impl Handler for ClearFolderHandler {
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
        ctx.started(Self::ID, None);
        let mut tally = Tally::default();
        let mut cleared = Vec::new();

        for folder in inputs {
            ctx.checkpoint()?;
            let root = folder.source_path();
            if !folder.is_real_dir() {
                ctx.file(&mut tally, root, None, FileOutcome::Skipped);
                continue;
            }

            ctx.status(format!("Handling: {}", root.display()));
            let walk = fsops::walk(root, WalkOptions::default()).await?;
            for err in walk.errors {
                ctx.file(&mut tally, &err.path, None, FileOutcome::Failed(err.to_string()));
            }

            for entry in walk.entries.iter().filter(|entry| !entry.is_real_dir()) {
                ctx.checkpoint()?;
                ctx.status(format!("Deleting: {}", entry.path.display()));
                let outcome = match fsops::remove_entry(&entry.path).await {
                    Ok(()) => FileOutcome::Done,
                    Err(err) => FileOutcome::Failed(err.to_string()),
                };
                ctx.file(&mut tally, &entry.path, None, outcome);
            }
            cleared.push(folder.relocated(root).await);
        }

        ctx.finished(Self::ID, tally.summary("deleted"));
        Ok(cleared)
    }
}

impl Configurable for ClearFolderHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(
            Self::ID,
            "Clear folder",
            "Delete all files in the folders recursively, keeping the folders.",
        )
    }

    fn from_params(_params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::context::testing::recording_context;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_delete_files_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("a.txt"));
        touch(&temp_dir.path().join("dir/inner.txt"));

        let inputs = vec![
            FileRef::stat(temp_dir.path().join("a.txt")).await.unwrap(),
            FileRef::stat(temp_dir.path().join("dir")).await.unwrap(),
        ];
        let (ctx, observer) = recording_context();
        let out = FileDeleteHandler.process(&inputs, &ctx).await.unwrap();

        assert!(out.is_empty());
        assert!(!temp_dir.path().join("a.txt").exists());
        assert!(!temp_dir.path().join("dir").exists());
        assert_eq!(observer.summaries(), vec!["Finish, 2 files deleted."]);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_stop_batch() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("gone.txt"));
        touch(&temp_dir.path().join("b.txt"));
        let gone = FileRef::stat(temp_dir.path().join("gone.txt")).await.unwrap();
        let b = FileRef::stat(temp_dir.path().join("b.txt")).await.unwrap();
        std::fs::remove_file(temp_dir.path().join("gone.txt")).unwrap();

        let (ctx, observer) = recording_context();
        FileDeleteHandler.process(&[gone, b], &ctx).await.unwrap();

        assert!(!temp_dir.path().join("b.txt").exists());
        assert_eq!(observer.summaries(), vec!["Finish, 1 files deleted, 1 failed."]);
    }

    #[tokio::test]
    async fn test_clear_folder_keeps_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        touch(&root.join("a.txt"));
        touch(&root.join("sub/b.txt"));
        touch(&root.join("sub/deeper/c.txt"));
        touch(&temp_dir.path().join("loose.txt"));

        let inputs = vec![
            FileRef::stat(&root).await.unwrap(),
            FileRef::stat(temp_dir.path().join("loose.txt")).await.unwrap(),
        ];
        let (ctx, observer) = recording_context();
        let out = ClearFolderHandler.process(&inputs, &ctx).await.unwrap();

        assert_eq!(out.len(), 1);
        assert!(root.join("sub/deeper").is_dir());
        assert!(!root.join("a.txt").exists());
        assert!(!root.join("sub/b.txt").exists());
        assert!(!root.join("sub/deeper/c.txt").exists());
        assert!(temp_dir.path().join("loose.txt").exists());
        assert_eq!(observer.summaries(), vec!["Finish, 3 files deleted, 1 skipped."]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clear_folder_removes_links_not_targets() {
        let temp_dir = TempDir::new().unwrap();
        let outside = temp_dir.path().join("outside");
        touch(&outside.join("keep.txt"));
        let root = temp_dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let (ctx, observer) = recording_context();
        ClearFolderHandler
            .process(&[FileRef::stat(&root).await.unwrap()], &ctx)
            .await
            .unwrap();

        assert!(std::fs::symlink_metadata(root.join("link")).is_err());
        assert!(outside.join("keep.txt").exists());
        assert_eq!(observer.summaries(), vec!["Finish, 1 files deleted."]);
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let out = ClearFolderHandler
            .process(&[], &HandlerContext::detached())
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
