//! Omnichat core: the vocabulary shared by every other crate.
//!
//! - [`types`]: normalized `Message` / `ToolCall` / `ChatCompletionResponse` model
//! - [`error`]: the error taxonomy surfaced to callers
//! - [`reasoning`]: `<think>` segment extraction applied to every response
//! - [`config`]: on-disk configuration and env var overrides

pub mod config;
pub mod error;
pub mod reasoning;
pub mod types;
pub mod utils;

pub use error::{ConfigurationError, Error, ProviderError, Result, SchemaError};
pub use types::{
    AssistantMessage, ChatCompletionResponse, Choice, FinishReason, FunctionCall,
    FunctionDefinition, Message, ParametersSchema, PropertySchema, ToolCall, ToolDefinition,
    ToolMessage, ToolSpec, Usage,
};
