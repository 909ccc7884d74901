//! Tool infrastructure: registry, input schemas, handler interface, slim mode.
//!
//! Descriptors are registered once at startup and shared read-only; the
//! dispatcher resolves calls against them.

pub mod catalog;
pub mod handler;
pub mod schema;
pub mod slim;

pub use catalog::{ToolCategory, ToolDescriptor, ToolRegistry};
#[cfg(test)]
pub use handler::MockToolHandler;
pub use handler::{HandlerOutput, ToolHandler};
pub use schema::{InputSchema, ParamDef, ParamType, SchemaViolation};
pub use slim::{MetaTool, SlimProxy};
