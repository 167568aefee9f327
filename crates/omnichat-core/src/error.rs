//! Error taxonomy.
//!
//! Everything is reported at the point of detection; nothing is swallowed.
//! Reaching the turn limit of a tool conversation is not an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by the client, tool registry and executor.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed model identifier or unknown provider key. Raised before any call.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The tools argument cannot drive a tool conversation. Raised before any model call.
    #[error("invalid tool configuration: {0}")]
    ToolConfiguration(String),

    /// Tool registration failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Tool-call arguments were not a JSON object.
    #[error("invalid arguments for tool '{tool}': {source}")]
    ToolArgument {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model requested a tool that is not registered.
    #[error("Tool '{0}' not registered.")]
    ToolNotRegistered(String),

    /// Tool-call arguments did not satisfy the tool's parameter model.
    #[error("Error in tool '{tool}' parameters: {detail}")]
    ToolValidation { tool: String, detail: String },

    /// The tool's own handler failed. The handler error is kept as the source.
    #[error("tool '{tool}' failed: {source}")]
    ToolFailed {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    /// Opaque adapter/transport failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid model format. Expected 'provider:model', got '{0}'")]
    MalformedModel(String),

    #[error(
        "Invalid provider key '{key}'. Supported providers: {}. \
         Make sure the model string is formatted correctly as 'provider:model'.",
        supported.join(", ")
    )]
    UnsupportedProvider { key: String, supported: Vec<String> },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Parameter '{parameter}' in function '{function}' must have a type annotation.")]
    MissingAnnotation { function: String, parameter: String },

    #[error("Parameter model for '{function}' is not usable: {detail}")]
    InvalidModel { function: String, detail: String },
}

/// Failure raised by an adapter. The core never inspects or retries it.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} API key is missing. Provide it in the config or set the {env_key} environment variable.")]
    MissingCredentials { provider: String, env_key: String },

    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },

    #[error("{0}")]
    Other(String),
}
