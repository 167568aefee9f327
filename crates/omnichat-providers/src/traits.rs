//! Provider trait: the one capability every vendor adapter implements.
//!
//! Adapters translate the normalized message list into their vendor's wire
//! format, make the call, and translate the reply back into a
//! [`ChatCompletionResponse`]. Nothing above this layer sees vendor payloads.

use async_trait::async_trait;
use serde_json::{Map, Value};

use omnichat_core::{ChatCompletionResponse, Message, ProviderError, ToolDefinition};

/// Per-call options forwarded to the adapter.
///
/// `extra` carries vendor-specific parameters (`top_p`, `seed`, ...) and is
/// merged into the request body verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionOptions {
    /// Tools advertised to the model.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Maximum tokens to generate. Adapter default when `None`.
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: Option<f64>,
    pub extra: Map<String, Value>,
}

impl CompletionOptions {
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Add a vendor-specific request parameter.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Advertised tools, empty if none.
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// Trait that all vendor adapters must implement.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `model`   : Vendor model name, without the provider key (e.g. `"llama3-70b-8192"`).
    /// * `messages`: Conversation history.
    /// * `options` : Tools, temperature, max_tokens and vendor extras.
    ///
    /// # Returns
    /// A normalized response with exactly one choice. Vendor failures are
    /// returned as [`ProviderError`] and never retried.
    async fn create_completion(
        &self,
        model: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ChatCompletionResponse, ProviderError>;

    /// Display name for logging.
    fn name(&self) -> &str;
}
