//! Duplicate name resolution
//!
//! [`NumberingTemplate`] describes how a counter is rendered into a name and
//! [`NameResolver`] assigns collision-free names to a batch in input order.

mod resolver;
mod template;

pub use resolver::{NameResolver, resolve};
pub use template::{MAX_WIDTH, NumberingTemplate, Position, TemplateError};
