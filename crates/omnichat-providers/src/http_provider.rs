//! Generic HTTP adapter for OpenAI-compatible APIs.
//!
//! Talks directly to any `/chat/completions` endpoint and normalizes the reply.
//! Covers every built-in spec with [`ApiStyle::OpenAi`](crate::registry::ApiStyle).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use omnichat_core::config::ProviderConfig;
use omnichat_core::{
    AssistantMessage, ChatCompletionResponse, Choice, FinishReason, Message, ProviderError,
    ToolCall, ToolDefinition, Usage,
};

use crate::registry::{resolve_api_key, ProviderSpec};
use crate::traits::{CompletionOptions, Provider};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    /// Usually a JSON-encoded string; some servers send the object itself.
    #[serde(default)]
    arguments: Value,
}

impl From<WireToolCall> for ToolCall {
    fn from(call: WireToolCall) -> Self {
        let arguments = match call.function.arguments {
            Value::String(s) => s,
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        ToolCall::new(call.id, call.function.name, arguments)
    }
}

impl ChatResponse {
    fn into_normalized(self, provider: &str) -> Result<ChatCompletionResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode {
                provider: provider.to_string(),
                message: "response contained no choices".to_string(),
            })?;

        let message = AssistantMessage {
            content: choice.message.content,
            reasoning_content: choice.message.reasoning_content,
            tool_calls: choice
                .message
                .tool_calls
                .map(|calls| calls.into_iter().map(ToolCall::from).collect()),
            refusal: choice.message.refusal,
        };

        Ok(ChatCompletionResponse {
            id: self.id,
            model: self.model,
            choices: vec![Choice {
                message,
                finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_vendor),
                intermediate_messages: Vec::new(),
            }],
            usage: self.usage,
            intermediate_responses: Vec::new(),
        }
        .normalize())
    }
}

/// Encode messages for the request body.
///
/// `refusal` and `reasoning_content` are response-only fields and are dropped.
fn wire_messages(messages: &[Message], tool_results_as_text: bool) -> Result<Vec<Value>, ProviderError> {
    messages
        .iter()
        .map(|msg| {
            let mut value = serde_json::to_value(msg)
                .map_err(|e| ProviderError::Other(format!("failed to encode message: {e}")))?;
            if let Some(obj) = value.as_object_mut() {
                obj.remove("refusal");
                obj.remove("reasoning_content");
                if tool_results_as_text {
                    if let Message::Tool(tool) = msg {
                        obj.insert("content".into(), Value::String(result_as_text(&tool.content)));
                    }
                }
            }
            Ok(value)
        })
        .collect()
}

/// `"\"sunny\""` → `sunny`; anything that is not a JSON string stays as is.
fn result_as_text(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::String(s)) => s,
        _ => content.to_string(),
    }
}

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// Adapter for any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.groq.com/openai/v1"`).
    api_base: String,
    /// Bearer token. Empty for local servers without auth.
    api_key: String,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Create an adapter from the user's config and a static spec.
    ///
    /// The API key comes from the config, falling back to `spec.env_key`.
    pub fn new(config: &ProviderConfig, spec: &'static ProviderSpec) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(config, spec, |key| std::env::var(key).ok())?;

        // Resolve API base: config > spec default
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpProvider {
            client,
            api_base,
            api_key,
            extra_headers: build_headers(config),
            spec,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    fn transport_error(&self, e: impl std::fmt::Display) -> ProviderError {
        ProviderError::Transport {
            provider: self.spec.display_name.to_string(),
            message: e.to_string(),
        }
    }
}

/// Parse configured extra headers, skipping invalid ones.
pub(crate) fn build_headers(config: &ProviderConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(ref extra) = config.extra_headers {
        for (key, value) in extra {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            } else {
                warn!("Invalid header: {}={}", key, value);
            }
        }
    }
    headers
}

#[async_trait]
impl Provider for HttpProvider {
    async fn create_completion(
        &self,
        model: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        debug!(
            provider = self.spec.display_name,
            model = %model,
            messages = messages.len(),
            tools = options.tool_definitions().len(),
            "Calling LLM"
        );

        let tools = options.tools.as_deref().filter(|t| !t.is_empty());
        let request_body = ChatRequest {
            model,
            messages: wire_messages(messages, self.spec.tool_results_as_text)?,
            tools,
            tool_choice: tools
                .filter(|_| !options.extra.contains_key("tool_choice"))
                .map(|_| "auto"),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            extra: &options.extra,
        };

        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
            self.transport_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Api {
                provider: self.spec.display_name.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let chat_resp = response.json::<ChatResponse>().await.map_err(|e| {
            error!(
                provider = self.spec.display_name,
                error = %e,
                "Failed to parse LLM response"
            );
            ProviderError::Decode {
                provider: self.spec.display_name.to_string(),
                message: e.to_string(),
            }
        })?;

        let normalized = chat_resp.into_normalized(self.spec.display_name)?;
        debug!(
            provider = self.spec.display_name,
            tool_calls = normalized.tool_calls().len(),
            finish_reason = ?normalized.finish_reason(),
            "LLM response received"
        );
        Ok(normalized)
    }

    fn name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
