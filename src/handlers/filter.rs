use async_trait::async_trait;

use super::context::HandlerContext;
use super::registry::HandlerDefaults;
use super::traits::{Configurable, Handler, HandlerError, describe_with};
use super::types::{FileOutcome, Tally};
use crate::files::FileRef;
use crate::params::{HandlerMetadata, ParamKind, ParamSpec, ParameterSet, ValidationError};
use crate::pattern::{FilterExpr, PatternError};
use crate::range::RangeSpec;

/// Keeps the inputs accepted by a logical filter expression
#[derive(Debug, Clone)]
pub struct FileFilterHandler {
    text: String,
    expr: FilterExpr,
}

impl FileFilterHandler {
    pub const ID: &'static str = "FileFilterHandler";

    pub fn new(text: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        Ok(Self {
            expr: FilterExpr::parse(text, case_sensitive)?,
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl Handler for FileFilterHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(Self::ID, &[("Expr", self.text.clone())])
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, None);
        let mut tally = Tally::default();
        let mut kept = Vec::new();

        for file in inputs {
            ctx.checkpoint()?;
            if self.expr.accepts(file) {
                ctx.file(&mut tally, &file.path, Some(&file.path), FileOutcome::Done);
                kept.push(file.clone());
            }
        }

        ctx.finished(Self::ID, tally.summary("matched"));
        Ok(kept)
    }
}

impl Configurable for FileFilterHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(
            Self::ID,
            "Filter",
            "Keep files matching an expression such as '(*.jpg | *.png) & !thumb*'.",
        )
        .param(ParamSpec::required(
            "Expr",
            ParamKind::Text,
            "Wildcard operands combined with !, & and |; @file and @dir test the kind.",
        ))
        .param(
            ParamSpec::optional("CaseSensitive", ParamKind::Bool, "Match case, default is true.")
                .with_default(true),
        )
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let text = params
            .text("Expr")
            .ok_or_else(|| ValidationError::missing(Self::ID, "Expr"))?;
        Ok(Self::new(text, params.flag("CaseSensitive").unwrap_or(true))?)
    }
}

/// Keeps the inputs whose 1-based position falls in a range expression
#[derive(Debug, Clone)]
pub struct FileSelectRangeHandler {
    range: RangeSpec,
}

impl FileSelectRangeHandler {
    pub const ID: &'static str = "FileSelectRangeHandler";

    pub fn new(range: RangeSpec) -> Self {
        Self { range }
    }
}

#[async_trait]
impl Handler for FileSelectRangeHandler {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> String {
        describe_with(Self::ID, &[("Range", self.range.to_string())])
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        ctx.started(Self::ID, None);
        let max = u32::try_from(inputs.len()).unwrap_or(u32::MAX);
        let mut tally = Tally::default();
        let mut kept = Vec::new();

        for (position, file) in (1..=max).zip(inputs) {
            ctx.checkpoint()?;
            if self.range.contains(position, max) {
                ctx.file(&mut tally, &file.path, Some(&file.path), FileOutcome::Done);
                kept.push(file.clone());
            }
        }

        ctx.finished(Self::ID, tally.summary("selected"));
        Ok(kept)
    }
}

impl Configurable for FileSelectRangeHandler {
    fn metadata() -> HandlerMetadata {
        HandlerMetadata::new(
            Self::ID,
            "Select range",
            "Keep files by position, e.g. '1,3-5,8-N'.",
        )
        .param(ParamSpec::required(
            "Range",
            ParamKind::Text,
            "Comma-separated positions and ranges; N is the last file.",
        ))
    }

    fn from_params(params: &ParameterSet, _defaults: &HandlerDefaults) -> Result<Self, ValidationError> {
        let text = params
            .text("Range")
            .ok_or_else(|| ValidationError::missing(Self::ID, "Range"))?;
        Ok(Self::new(RangeSpec::parse(text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileAttributes;
    use std::path::PathBuf;

    fn entry(name: &str, directory: bool) -> FileRef {
        FileRef {
            path: PathBuf::from("/data").join(name),
            name: name.to_string(),
            extension: None,
            size: 0,
            modified: None,
            attributes: FileAttributes {
                directory,
                ..FileAttributes::default()
            },
            origin: None,
        }
    }

    fn names(files: &[FileRef]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_filter_by_expression() {
        let inputs = vec![
            entry("photo.jpg", false),
            entry("thumb.jpg", false),
            entry("shot.png", false),
            entry("raw", true),
        ];
        let handler = FileFilterHandler::new("(*.jpg | *.png) & !thumb*", true).unwrap();
        let out = handler
            .process(&inputs, &HandlerContext::detached())
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["photo.jpg", "shot.png"]);

        let dirs = FileFilterHandler::new("@dir", true).unwrap();
        let out = dirs
            .process(&inputs, &HandlerContext::detached())
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["raw"]);
    }

    #[test]
    fn test_filter_rejects_malformed_expression() {
        let params = ParameterSet::new().with("Expr", "(*.jpg");
        let validated = FileFilterHandler::metadata().validate(&params).unwrap();
        let err = FileFilterHandler::from_params(&validated, &HandlerDefaults::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Pattern(PatternError::MalformedExpression { .. })
        ));
    }

    #[tokio::test]
    async fn test_select_range_resolves_open_end_against_input_length() {
        let inputs: Vec<FileRef> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| entry(name, false))
            .collect();
        let handler = FileSelectRangeHandler::new(RangeSpec::parse("1,3-N").unwrap());
        let out = handler
            .process(&inputs, &HandlerContext::detached())
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["a", "c", "d", "e"]);
    }

    #[test]
    fn test_select_range_rejects_bad_range() {
        let params = ParameterSet::new().with("Range", "5-2");
        let validated = FileSelectRangeHandler::metadata().validate(&params).unwrap();
        let err = FileSelectRangeHandler::from_params(&validated, &HandlerDefaults::default()).unwrap_err();
        assert!(matches!(err, ValidationError::Range(_)));
    }
}
