use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::rename::plan;
use super::traits::{Configurable, Handler, HandlerError, describe_with};
use super::types::Tally;
use crate::files::FileRef;
use crate::fsops;
use crate::naming::{MAX_WIDTH, NameResolver, NumberingTemplate, Position};
use crate::params::{HandlerMetadata, ParamEnum, ParamKind, ParamSpec, ParameterSet, ValidationError};

/// Numbers colliding planned names so a later commit cannot clash
///
/// Names are resolved per target directory against the siblings already on
/// disk, excluding the batch's own source entries (they are about to move).
#[derive(Debug, Clone)]
pub struct DuplicateHandler {
    template: NumberingTemplate,
}

impl DuplicateHandler {
    pub const ID: &'static str = "DuplicateHandler";

    pub fn new(template: NumberingTemplate) -> Self {
        Self { template }
    }

    async fn occupied_names(&self, inputs: &[FileRef]) -> Result<HashMap<PathBuf, HashSet<String>>, HandlerError> {
        let mut batch_sources: HashMap<&Path, HashSet<String>> = HashMap::new();
        for file in inputs {
            let source = file.source_path();
            if let (Some(parent), Some(name)) = (source.parent(), source.file_name()) {
                batch_sources
                    .entry(parent)
                    .or_default()
                    .insert(name.to_string_lossy().into_owned());
            }
        }

        let mut occupied = HashMap::new();
        for file in inputs {
            let dir = file.parent();
            if occupied.contains_key(dir) {
                continue;
            }
            let mut names = fsops::list_names(dir).await?;
            if let Some(own) = batch_sources.get(dir) {
                names.retain(|name| !own.contains(name));
            }
            occupied.insert(dir.to_path_buf(), names);
        }
        Ok(occupied)
    }
}

#[async_trait]
impl Handler for DuplicateHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(Self::ID, &[("Template", self.template.to_string())])
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, Some(inputs.len()));
        let mut occupied = self.occupied_names(inputs).await?;

        let mut resolvers: HashMap<PathBuf, NameResolver<'_>> = HashMap::new();
        let mut tally = Tally::default();
        let mut planned = Vec::with_capacity(inputs.len());

        for file in inputs {
            ctx.checkpoint()?;
            let dir = file.parent().to_path_buf();
            let resolver = resolvers.entry(dir.clone()).or_insert_with(|| {
                NameResolver::new(&self.template, occupied.remove(&dir).unwrap_or_default())
            });
            let name = resolver.claim(&file.name);
            planned.push(plan(ctx, &mut tally, file, &name));
        }

        ctx.finished(Self::ID, tally.summary("renamed"));
        Ok(planned)
    }
}

impl Configurable for DuplicateHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(
            Self::ID,
            "Duplicate names",
            "Number planned names that collide with each other or with existing files.",
        )
        .param(ParamSpec::optional(
            "Pattern",
            ParamKind::Text,
            "Numbering template containing N exactly once, e.g. (N), N_, [N]; forms repeating N such as N_N are rejected.",
        ))
        .param(ParamSpec::optional(
            "Position",
            ParamKind::Enum {
                variants: Position::VARIANTS,
            },
            "Put the number Before or After the name.",
        ))
        .param(ParamSpec::optional(
            "Width",
            ParamKind::Integer {
                min: 0,
                max: MAX_WIDTH as i64,
            },
            "Minimum number of digits.",
        ))
        .param(ParamSpec::optional(
            "CharFilling",
            ParamKind::Char,
            "Padding character, default is '0'.",
        ))
        .param(ParamSpec::optional(
            "BaseSystem",
            ParamKind::Integer { min: 2, max: 36 },
            "Numeric base of the counter, default is 10.",
        ))
        .param(ParamSpec::optional(
            "FirstFileIgnored",
            ParamKind::Bool,
            "The first occurrence keeps its bare name.",
        ))
        .param(ParamSpec::optional(
            "SuffixInclude",
            ParamKind::Bool,
            "Append the number after the suffix.",
        ))
    }

    fn from_params(params: &ParameterSet, defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let base = &defaults.naming;
        let template = NumberingTemplate::builder()
            .pattern(params.text("Pattern").unwrap_or(base.pattern()))
            .position(params.variant("Position").unwrap_or(base.position()))
            .width(params.unsigned("Width").map_or(base.width(), |width| width as usize))
            .fill(params.character("CharFilling").unwrap_or(base.fill()))
            .base(params.unsigned("BaseSystem").unwrap_or(base.base()))
            .ignore_first(params.flag("FirstFileIgnored").unwrap_or(base.ignore_first()))
            .include_suffix(params.flag("SuffixInclude").unwrap_or(base.include_suffix()))
            .build()?;
        Ok(Self::new(template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn planned_names(handler: &DuplicateHandler, inputs: &[FileRef]) -> Vec<String> {
        handler
            .process(inputs, &HandlerContext::detached())
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect()
    }

    #[tokio::test]
    async fn test_batch_collisions_numbered() {
        let temp_dir = TempDir::new().unwrap();
        let mut inputs = Vec::new();
        for name in ["x1.txt", "x2.txt", "x3.txt"] {
            let path = temp_dir.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            inputs.push(FileRef::stat(&path).await.unwrap().renamed("a.txt"));
        }

        let handler = DuplicateHandler::new(NumberingTemplate::parse("(N)").unwrap());
        assert_eq!(
            planned_names(&handler, &inputs).await,
            vec!["a.txt", "a(1).txt", "a(2).txt"]
        );
    }

    #[tokio::test]
    async fn test_on_disk_siblings_are_avoided() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"keep").unwrap();
        let source = temp_dir.path().join("b.txt");
        std::fs::write(&source, b"x").unwrap();

        let input = FileRef::stat(&source).await.unwrap().renamed("a.txt");
        let handler = DuplicateHandler::new(NumberingTemplate::parse("_N").unwrap());
        assert_eq!(planned_names(&handler, &[input]).await, vec!["a_1.txt"]);
    }

    #[tokio::test]
    async fn test_batch_sources_do_not_block_their_own_names() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        std::fs::write(&source, b"x").unwrap();

        let input = FileRef::stat(&source).await.unwrap();
        let handler = DuplicateHandler::new(NumberingTemplate::parse("(N)").unwrap());
        assert_eq!(planned_names(&handler, &[input]).await, vec!["a.txt"]);
    }

    #[test]
    fn test_params_override_config_template() {
        let params = ParameterSet::new()
            .with("Pattern", "[N]")
            .with("Width", 3u32)
            .with("Position", "Before");
        let validated = DuplicateHandler::metadata().validate(&params).unwrap();
        let handler = DuplicateHandler::from_params(&validated, &HandlerDefaults::default()).unwrap();
        assert_eq!(handler.template.apply("a.txt", 7), "[007]a.txt");
    }

    #[test]
    fn test_bad_template_rejected() {
        let params = ParameterSet::new().with("Pattern", "N_N");
        let validated = DuplicateHandler::metadata().validate(&params).unwrap();
        let err = DuplicateHandler::from_params(&validated, &HandlerDefaults::default()).unwrap_err();
        assert!(matches!(err, ValidationError::Template(_)));

        let metadata = DuplicateHandler::metadata();
        let pattern = metadata.spec("Pattern").unwrap();
        assert!(pattern.description.contains("N_N are rejected"));
    }
}
