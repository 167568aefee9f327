//! Chat client: provider dispatch plus the multi-turn tool conversation.
//!
//! A call with both `tools` and `max_turns` set runs the tool loop:
//!
//! ```text
//! Calling ──▶ Inspecting ──▶ Executing ──▶ Calling ...
//!                  │
//!                  └──▶ Done (no tool calls, or max_turns reached)
//! ```
//!
//! Any other call is a single adapter round trip.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use omnichat_core::config::ProviderConfig;
use omnichat_core::reasoning::extract_thinking;
use omnichat_core::{ChatCompletionResponse, Error, Message, Result, ToolDefinition};
use omnichat_providers::{CompletionOptions, Provider, ProviderRegistry};

use crate::tools::{Tool, Tools};

// ─────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────

/// One entry of a tool list.
#[derive(Clone)]
pub enum ToolItem {
    /// A registered, executable tool.
    Callable(Arc<dyn Tool>),
    /// A raw wire definition. Advertised only; cannot drive a tool conversation.
    Definition(ToolDefinition),
}

impl ToolItem {
    pub fn callable(tool: impl Tool + 'static) -> Self {
        ToolItem::Callable(Arc::new(tool))
    }

    fn to_definition(&self) -> ToolDefinition {
        match self {
            ToolItem::Callable(tool) => tool.to_definition(),
            ToolItem::Definition(def) => def.clone(),
        }
    }
}

impl std::fmt::Debug for ToolItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolItem::Callable(tool) => f.debug_tuple("Callable").field(&tool.name()).finish(),
            ToolItem::Definition(def) => f.debug_tuple("Definition").field(&def.function.name).finish(),
        }
    }
}

impl From<ToolDefinition> for ToolItem {
    fn from(def: ToolDefinition) -> Self {
        ToolItem::Definition(def)
    }
}

impl From<Arc<dyn Tool>> for ToolItem {
    fn from(tool: Arc<dyn Tool>) -> Self {
        ToolItem::Callable(tool)
    }
}

/// The `tools` argument of [`Client::create`].
#[derive(Clone, Debug)]
pub enum ToolsInput {
    Registry(Arc<Tools>),
    List(Vec<ToolItem>),
}

impl ToolsInput {
    /// Wire definitions to advertise, in order.
    fn definitions(&self) -> Vec<ToolDefinition> {
        match self {
            ToolsInput::Registry(tools) => tools.tools(),
            ToolsInput::List(items) => items.iter().map(ToolItem::to_definition).collect(),
        }
    }

    /// An executable registry, or an error if any list item is not callable.
    fn executable(&self) -> Result<Arc<Tools>> {
        match self {
            ToolsInput::Registry(tools) => Ok(Arc::clone(tools)),
            ToolsInput::List(items) => {
                let mut tools = Tools::new();
                for item in items {
                    match item {
                        ToolItem::Callable(tool) => tools.register(Arc::clone(tool)),
                        ToolItem::Definition(def) => {
                            return Err(Error::ToolConfiguration(format!(
                                "tool '{}' is a bare definition; every tool must be callable when max_turns is set",
                                def.function.name
                            )))
                        }
                    }
                }
                Ok(Arc::new(tools))
            }
        }
    }
}

impl From<Tools> for ToolsInput {
    fn from(tools: Tools) -> Self {
        ToolsInput::Registry(Arc::new(tools))
    }
}

impl From<Arc<Tools>> for ToolsInput {
    fn from(tools: Arc<Tools>) -> Self {
        ToolsInput::Registry(tools)
    }
}

impl From<Vec<ToolItem>> for ToolsInput {
    fn from(items: Vec<ToolItem>) -> Self {
        ToolsInput::List(items)
    }
}

/// Per-call options of [`Client::create`].
#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    pub tools: Option<ToolsInput>,
    /// Turn limit. Together with `tools`, enables the tool conversation.
    pub max_turns: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Vendor-specific parameters, forwarded verbatim.
    pub extra: Map<String, Value>,
}

impl ChatOptions {
    pub fn with_tools(mut self, tools: impl Into<ToolsInput>) -> Self {
        self.tools = Some(tools.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
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

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Adapter options without the tool list.
    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            tools: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            extra: self.extra.clone(),
        }
    }
}

// ─────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────

/// Entry point: one `create` call for every vendor.
#[derive(Debug, Default)]
pub struct Client {
    registry: ProviderRegistry,
}

impl Client {
    /// Client over every built-in provider, configured from the environment only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client with explicit per-provider configuration.
    pub fn with_config(configs: HashMap<String, ProviderConfig>) -> Self {
        Self {
            registry: ProviderRegistry::with_configs(configs),
        }
    }

    pub fn from_registry(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Add or replace the configuration of one provider.
    pub fn configure(&mut self, key: impl Into<String>, config: ProviderConfig) {
        self.registry.configure(key, config);
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    /// Send `messages` to `model` (`provider:model-name`).
    ///
    /// With both `tools` and `max_turns` set, tool calls requested by the
    /// model are executed and fed back until the model stops asking or
    /// `max_turns` turns have run. The caller's messages are never modified.
    pub async fn create(
        &self,
        model: &str,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<ChatCompletionResponse> {
        let (provider, model_name) = self.registry.resolve(model)?;

        match (&options.tools, options.max_turns) {
            (Some(tools), Some(max_turns)) => {
                let tools = tools.executable()?;
                if max_turns == 0 {
                    return Err(Error::ToolConfiguration(
                        "max_turns must be at least 1".into(),
                    ));
                }
                self.run_tools(provider.as_ref(), model_name, messages, &tools, max_turns, &options)
                    .await
            }
            (tools, _) => {
                let mut completion = options.completion_options();
                completion.tools = tools.as_ref().map(ToolsInput::definitions);
                debug!(provider = provider.name(), model = model_name, "Chat completion");
                let response = provider
                    .create_completion(model_name, messages, &completion)
                    .await?;
                Ok(extract_thinking(response.normalize()))
            }
        }
    }

    async fn run_tools(
        &self,
        provider: &dyn Provider,
        model_name: &str,
        messages: &[Message],
        tools: &Tools,
        max_turns: u32,
        options: &ChatOptions,
    ) -> Result<ChatCompletionResponse> {
        let completion = options.completion_options().with_tools(tools.tools());
        let mut transcript = messages.to_vec();
        let mut intermediate_responses: Vec<ChatCompletionResponse> = Vec::new();
        let mut intermediate_messages: Vec<Message> = Vec::new();
        let mut turn = 0;

        loop {
            debug!(provider = provider.name(), model = model_name, turn, "Chat completion");
            let response = provider
                .create_completion(model_name, &transcript, &completion)
                .await?;
            let response = extract_thinking(response.normalize());

            let Some(assistant) = response.message().cloned() else {
                return Ok(finish(response, intermediate_responses, intermediate_messages));
            };
            intermediate_messages.push(Message::from(assistant.clone()));

            if !response.requests_tools() {
                debug!(turn, "Model finished without tool calls");
                return Ok(finish(response, intermediate_responses, intermediate_messages));
            }

            let execution = tools.execute_tool(assistant.calls()).await?;
            debug!(turn, calls = execution.results.len(), "Executed tool calls");

            transcript.push(Message::from(assistant));
            transcript.extend(execution.messages.iter().cloned());
            intermediate_messages.extend(execution.messages);
            turn += 1;

            if turn >= max_turns {
                debug!(max_turns, "Turn limit reached");
                return Ok(finish(response, intermediate_responses, intermediate_messages));
            }
            intermediate_responses.push(response);
        }
    }
}

/// Attach the conversation history to the response being returned.
fn finish(
    mut response: ChatCompletionResponse,
    intermediate_responses: Vec<ChatCompletionResponse>,
    intermediate_messages: Vec<Message>,
) -> ChatCompletionResponse {
    response.intermediate_responses = intermediate_responses;
    if let Some(choice) = response.choice_mut() {
        choice.intermediate_messages = intermediate_messages;
    }
    response
}
