//! Tool trait: the interface every registered tool implements.
//!
//! Both registration paths ([`FunctionTool`](super::FunctionTool) and
//! [`TypedTool`](super::TypedTool)) produce a `Tool`. The registry only ever
//! talks to this trait.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use omnichat_core::{ToolDefinition, ToolSpec};

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// A callable tool with a fixed spec and parameter model.
///
/// The executor calls [`Tool::validate`] first and only hands validated
/// arguments to [`Tool::call`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool spec derived at registration. Never changes afterwards.
    fn spec(&self) -> &ToolSpec;

    /// Unique name used by the model to call this tool.
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Check arguments against the parameter model.
    ///
    /// Returns the normalized arguments (coerced, defaults filled), or a
    /// human-readable description of what is wrong.
    fn validate(&self, args: Map<String, Value>) -> Result<Map<String, Value>, String>;

    /// Run the handler. The returned value is JSON-encoded into the tool message.
    async fn call(&self, args: Map<String, Value>) -> anyhow::Result<Value>;

    /// Build the `ToolDefinition` sent to the model.
    fn to_definition(&self) -> ToolDefinition {
        self.spec().to_definition()
    }
}

// ─────────────────────────────────────────────
// Args: validated arguments handed to handlers
// ─────────────────────────────────────────────

/// Validated arguments of a [`FunctionTool`](super::FunctionTool) call.
///
/// Every declared parameter is present (defaults already filled in) and has
/// the declared JSON type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new(map: Map<String, Value>) -> Self {
        Args(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Extract a required string param, returning a user-friendly error.
    pub fn require_str(&self, key: &str) -> anyhow::Result<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
    }

    pub fn require_i64(&self, key: &str) -> anyhow::Result<i64> {
        self.0
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("Missing required integer parameter: {key}"))
    }

    pub fn require_f64(&self, key: &str) -> anyhow::Result<f64> {
        self.0
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow::anyhow!("Missing required number parameter: {key}"))
    }

    pub fn require_bool(&self, key: &str) -> anyhow::Result<bool> {
        self.0
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| anyhow::anyhow!("Missing required boolean parameter: {key}"))
    }

    /// Extract an optional string param.
    pub fn optional_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Deserialize one parameter into any serde type (enums, vectors, ...).
    pub fn parse<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<T> {
        let value = self
            .0
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
