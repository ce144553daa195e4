use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError};
use super::types::{FileOutcome, Tally};
use crate::files::FileRef;
use crate::fsops;
use crate::params::{HandlerMetadata, ParameterSet, ValidationError};

/// Commits a rename plan to disk
///
/// Each input's source is its `origin`, or the item at the same position
/// of the enclosing stage's input. Positional matching is 1:1: when some
/// input has no `origin`, a stage input of a different length fails the
/// whole task. Inputs that all carry an `origin` may be fewer than the
/// stage input, as after a filter.
#[derive(Debug, Clone, Default)]
pub struct FileRenameHandler;

impl FileRenameHandler {
    pub const ID: &'static str = "FileRenameHandler";

    fn source_of(file: &FileRef, index: usize, originals: Option<&[FileRef]>) -> PathBuf {
        match (&file.origin, originals) {
            (Some(origin), _) => origin.clone(),
            (None, Some(originals)) => originals[index].source_path().to_path_buf(),
            (None, None) => file.path.clone(),
        }
    }

    async fn commit(&self, source: &Path, target: &Path) -> Result<FileOutcome, String> {
        if source == target {
            return Ok(FileOutcome::Skipped);
        }
        if !fsops::exists(source).await {
            return Err("source no longer exists".to_string());
        }
        if fsops::exists(target).await && !fsops::same_entry(source, target).await {
            return Err(format!("{} already exists", target.display()));
        }
        fsops::rename_entry(source, target)
            .await
            .map(|()| FileOutcome::Done)
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl Handler for FileRenameHandler {
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
        let originals = ctx.originals();
        let positional = inputs.iter().any(|file| file.origin.is_none());
        if let Some(originals) = originals.filter(|_| positional) {
            if originals.len() != inputs.len() {
                return Err(HandlerError::CountMismatch {
                    expected: originals.len(),
                    actual: inputs.len(),
                });
            }
        }

        ctx.started(Self::ID, Some(inputs.len()));
        let mut tally = Tally::default();
        let mut renamed = Vec::with_capacity(inputs.len());

        for (index, file) in inputs.iter().enumerate() {
            ctx.checkpoint()?;
            let source = Self::source_of(file, index, originals);
            ctx.status(format!("Handling: {}", source.display()));

            match self.commit(&source, &file.path).await {
                Ok(outcome) => {
                    debug!(source = %source.display(), target = %file.path.display(), "renamed");
                    ctx.file(&mut tally, &source, Some(&file.path), outcome);
                    renamed.push(file.relocated(&file.path).await);
                }
                Err(reason) => ctx.file(&mut tally, &source, None, FileOutcome::Failed(reason)),
            }
        }

        ctx.finished(Self::ID, tally.summary("renamed"));
        Ok(renamed)
    }
}

impl Configurable for FileRenameHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(
            Self::ID,
            "Rename",
            "Apply the planned names of the previous stages to the disk.",
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
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_commits_plan() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("old.txt");
        std::fs::write(&source, b"content").unwrap();

        let planned = FileRef::stat(&source).await.unwrap().renamed("new.txt");
        let (ctx, observer) = recording_context();
        let out = FileRenameHandler.process(&[planned], &ctx).await.unwrap();

        assert!(!source.exists());
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("new.txt")).unwrap(),
            "content"
        );
        assert_eq!(out[0].name, "new.txt");
        assert!(out[0].origin.is_none());
        assert_eq!(observer.summaries(), vec!["Finish, 1 files renamed."]);
    }

    #[tokio::test]
    async fn test_collision_is_per_file_failure() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        let c = temp_dir.path().join("c.txt");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        std::fs::write(&c, b"c").unwrap();

        let plan = vec![
            FileRef::stat(&a).await.unwrap().renamed("b.txt"),
            FileRef::stat(&c).await.unwrap().renamed("d.txt"),
        ];
        let (ctx, observer) = recording_context();
        let out = FileRenameHandler.process(&plan, &ctx).await.unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "b");
        assert!(temp_dir.path().join("d.txt").exists());
        assert!(matches!(observer.outcomes()[0], FileOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_count_mismatch_against_stage_input() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        std::fs::write(&a, b"a").unwrap();
        let file = FileRef::stat(&a).await.unwrap();

        let ctx = HandlerContext::detached().with_originals(Arc::from(vec![file.clone(), file.clone()]));
        let err = FileRenameHandler.process(&[file], &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert!(a.exists());
    }

    #[tokio::test]
    async fn test_shrunk_plan_with_origins_commits() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let first = FileRef::stat(&a).await.unwrap();
        let second = FileRef::stat(&b).await.unwrap();

        let ctx = HandlerContext::detached().with_originals(Arc::from(vec![first.clone(), second]));
        let out = FileRenameHandler
            .process(&[first.renamed("A.txt")], &ctx)
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("A.txt")).unwrap(), "a");
        assert!(b.exists());
    }

    #[tokio::test]
    async fn test_source_taken_from_originals_without_origin() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        std::fs::write(&a, b"a").unwrap();
        let original = FileRef::stat(&a).await.unwrap();

        let mut planned = original.renamed("z.txt");
        planned.origin = None;

        let ctx = HandlerContext::detached().with_originals(Arc::from(vec![original]));
        let out = FileRenameHandler.process(&[planned], &ctx).await.unwrap();
        assert_eq!(out[0].name, "z.txt");
        assert!(temp_dir.path().join("z.txt").exists());
    }
}
