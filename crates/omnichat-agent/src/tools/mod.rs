//! Tool registration and execution for Omnichat.

pub mod base;
pub mod docs;
pub mod registry;
pub mod schema;
pub mod typed;

pub use base::{Args, Tool};
pub use docs::{parse_doc, ParsedDoc};
pub use registry::{ToolExecution, ToolOutput, Tools};
pub use schema::{infer_spec, FunctionTool, FunctionToolBuilder, Param, ParamType};
pub use typed::{spec_from_schema, TypedTool};
