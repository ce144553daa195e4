use async_trait::async_trait;
use std::sync::Arc;

use super::context::HandlerContext;
use super::traits::{Handler, HandlerError};
use crate::files::FileRef;

/// Sequential composition: `second` consumes `first`'s output
///
/// `second` sees the pipe's own input as `ctx.originals()`, which 1:1
/// handlers compare against to detect count divergence.
pub struct Pipe {
    first: Arc<dyn Handler>,
    second: Arc<dyn Handler>,
}

impl Pipe {
    pub fn new(first: Arc<dyn Handler>, second: Arc<dyn Handler>) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl Handler for Pipe {
    fn name(&self) -> &'static str {
        "Pipe"
    }

    fn describe(&self) -> String {
        format!("{} | {}", self.first.describe(), self.second.describe())
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        let intermediate = self.first.process(inputs, ctx).await?;
        let stage_ctx = ctx.with_originals(Arc::from(inputs));
        self.second.process(&intermediate, &stage_ctx).await
    }
}

/// Fan-out composition: both branches process the same input and their
/// outputs are concatenated, `first` before `second`
pub struct Combine {
    first: Arc<dyn Handler>,
    second: Arc<dyn Handler>,
}

impl Combine {
    pub fn new(first: Arc<dyn Handler>, second: Arc<dyn Handler>) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl Handler for Combine {
    fn name(&self) -> &'static str {
        "Combine"
    }

    fn describe(&self) -> String {
        format!("({} + {})", self.first.describe(), self.second.describe())
    }

    async fn process(
        &self,
        inputs: &[FileRef],
        ctx: &HandlerContext,
    ) -> Result<Vec<FileRef>, HandlerError> {
        let mut outputs = self.first.process(inputs, ctx).await?;
        outputs.extend(self.second.process(inputs, ctx).await?);
        Ok(outputs)
    }
}

/// Chain stages right-to-left: `[a, b, c]` becomes `Pipe(a, Pipe(b, c))`
pub fn pipe(stages: Vec<Arc<dyn Handler>>) -> Option<Arc<dyn Handler>> {
    stages
        .into_iter()
        .rev()
        .reduce(|tail, head| -> Arc<dyn Handler> { Arc::new(Pipe::new(head, tail)) })
}

/// Fan out to every branch: `[a, b, c]` becomes `Combine(a, Combine(b, c))`
pub fn combine(branches: Vec<Arc<dyn Handler>>) -> Option<Arc<dyn Handler>> {
    branches
        .into_iter()
        .rev()
        .reduce(|tail, head| -> Arc<dyn Handler> { Arc::new(Combine::new(head, tail)) })
}
