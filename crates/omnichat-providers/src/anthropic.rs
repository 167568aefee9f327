//! Anthropic Messages API adapter.
//!
//! Anthropic differs from the OpenAI shape in three ways that the converter
//! absorbs: the system prompt is a top-level field, tool calls are `tool_use`
//! content blocks, and tool results travel as `tool_result` blocks inside a
//! user turn.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use omnichat_core::config::ProviderConfig;
use omnichat_core::{
    AssistantMessage, ChatCompletionResponse, Choice, FinishReason, Message, ProviderError,
    ToolCall, ToolDefinition, Usage,
};

use crate::http_provider::build_headers;
use crate::registry::{resolve_api_key, ProviderSpec};
use crate::traits::{CompletionOptions, Provider};

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    Thinking {
        thinking: String,
    },
    /// Block types this adapter does not interpret.
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: MessageContent,
}

impl AnthropicMessage {
    fn text(role: &str, text: impl Into<String>) -> Self {
        AnthropicMessage {
            role: role.to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    fn blocks(role: &str, blocks: Vec<ContentBlock>) -> Self {
        AnthropicMessage {
            role: role.to_string(),
            content: MessageContent::Blocks(blocks),
        }
    }

    /// A user turn made only of tool results, which later results may join.
    fn tool_results_mut(&mut self) -> Option<&mut Vec<ContentBlock>> {
        match &mut self.content {
            MessageContent::Blocks(blocks)
                if self.role == "user"
                    && blocks
                        .iter()
                        .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
            {
                Some(blocks)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

// ─────────────────────────────────────────────
// Converter
// ─────────────────────────────────────────────

/// Convert normalized messages into `(system, messages)` for the Messages API.
///
/// The first system message becomes the `system` field. Later system
/// messages are dropped with a warning. Consecutive tool results are merged
/// into a single user turn.
pub fn convert_request(
    messages: &[Message],
) -> Result<(Option<String>, Vec<AnthropicMessage>), ProviderError> {
    let mut system: Option<String> = None;
    let mut converted: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::System { content } => {
                if system.is_none() {
                    system = Some(content.clone());
                } else {
                    warn!("Dropping additional system message; Anthropic accepts only one");
                }
            }
            Message::User { content } => converted.push(AnthropicMessage::text("user", content.clone())),
            Message::Assistant(msg) if msg.has_tool_calls() => {
                let mut blocks = Vec::new();
                if let Some(text) = msg.content.as_deref().filter(|t| !t.is_empty()) {
                    blocks.push(ContentBlock::Text { text: text.to_string() });
                }
                for call in msg.calls() {
                    let raw = call.function.arguments.trim();
                    let raw = if raw.is_empty() { "{}" } else { raw };
                    let input: Value = serde_json::from_str(raw).map_err(|e| {
                        ProviderError::Other(format!(
                            "tool call '{}' has invalid JSON arguments: {e}",
                            call.id
                        ))
                    })?;
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        input,
                    });
                }
                converted.push(AnthropicMessage::blocks("assistant", blocks));
            }
            Message::Assistant(msg) => converted.push(AnthropicMessage::text(
                "assistant",
                msg.content.clone().unwrap_or_default(),
            )),
            Message::Tool(result) => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: result.tool_call_id.clone(),
                    content: result.content.clone(),
                };
                match converted.last_mut().and_then(AnthropicMessage::tool_results_mut) {
                    Some(blocks) => blocks.push(block),
                    None => converted.push(AnthropicMessage::blocks("user", vec![block])),
                }
            }
        }
    }

    Ok((system, converted))
}

/// Convert OpenAI-style tool definitions to Anthropic's `input_schema` form.
pub fn convert_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .filter(|tool| tool.tool_type == "function")
        .map(|tool| {
            let params = &tool.function.parameters;
            AnthropicTool {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                input_schema: json!({
                    "type": "object",
                    "properties": params.get("properties").cloned().unwrap_or_else(|| json!({})),
                    "required": params.get("required").cloned().unwrap_or_else(|| json!([])),
                }),
            }
        })
        .collect()
}

/// Normalize a Messages API response.
///
/// Text blocks are concatenated into `content`, thinking blocks into
/// `reasoning_content`, and every `tool_use` block becomes a [`ToolCall`].
pub fn convert_response(response: MessagesResponse) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut thinking = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::Thinking { thinking: t } => thinking.push_str(&t),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::new(id, name, input.to_string()))
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unsupported => {}
        }
    }

    let message = AssistantMessage {
        content: (!text.is_empty()).then_some(text),
        reasoning_content: (!thinking.is_empty()).then_some(thinking),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        refusal: None,
    };

    ChatCompletionResponse {
        id: response.id,
        model: response.model,
        choices: vec![Choice {
            message,
            finish_reason: Some(FinishReason::from_vendor(
                response.stop_reason.as_deref().unwrap_or("end_turn"),
            )),
            intermediate_messages: Vec::new(),
        }],
        usage: response
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens)),
        intermediate_responses: Vec::new(),
    }
    .normalize()
}

// ─────────────────────────────────────────────
// AnthropicProvider
// ─────────────────────────────────────────────

/// Adapter for the native Anthropic Messages API.
///
/// Config options: `apiKey` (or `ANTHROPIC_API_KEY`), `apiBase`,
/// `timeoutSecs`, `extraHeaders`, and `apiVersion` for the
/// `anthropic-version` header.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    api_version: String,
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig, spec: &'static ProviderSpec) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(config, spec, |key| std::env::var(key).ok())?;
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());
        let api_version = config
            .option_str("apiVersion")
            .unwrap_or(DEFAULT_API_VERSION)
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(AnthropicProvider {
            client,
            api_base,
            api_key,
            api_version,
            extra_headers: build_headers(config),
            spec,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn create_completion(
        &self,
        model: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let (system, converted) = convert_request(messages)?;
        let body = MessagesRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages: converted,
            tools: convert_tools(options.tool_definitions()),
            temperature: options.temperature,
            extra: &options.extra,
        };

        debug!(
            provider = self.spec.display_name,
            model = %model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Calling LLM"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .headers(self.extra_headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
                ProviderError::Transport {
                    provider: self.spec.display_name.to_string(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(provider = self.spec.display_name, status = %status, body = %body, "API error");
            return Err(ProviderError::Api {
                provider: self.spec.display_name.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.json::<MessagesResponse>().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "Failed to parse LLM response");
            ProviderError::Decode {
                provider: self.spec.display_name.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(convert_response(raw))
    }

    fn name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::find_by_name;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn weather_call() -> AssistantMessage {
        AssistantMessage::tool_calls(vec![ToolCall::new(
            "toolu_1",
            "get_weather",
            r#"{"location": "Paris"}"#,
        )])
    }

    #[test]
    fn test_single_user_message() {
        let (system, messages) = convert_request(&[Message::user("Hello")]).unwrap();
        assert!(system.is_none());
        assert_eq!(messages, vec![AnthropicMessage::text("user", "Hello")]);
    }

    #[test]
    fn test_first_system_message_wins() {
        let (system, messages) = convert_request(&[
            Message::system("You are a helpful assistant."),
            Message::user("Hi"),
            Message::system("Ignore me."),
        ])
        .unwrap();
        assert_eq!(system.as_deref(), Some("You are a helpful assistant."));
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_tool_call_and_result() {
        let (_, messages) = convert_request(&[
            Message::user("Weather in Paris?"),
            weather_call().into(),
            Message::tool_result("toolu_1", "get_weather", "\"sunny\""),
        ])
        .unwrap();

        let wire = serde_json::to_value(&messages).unwrap();
        assert_eq!(
            wire[1],
            json!({
                "role": "assistant",
                "content": [{"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Paris"}}]
            })
        );
        assert_eq!(
            wire[2],
            json!({
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": "toolu_1", "content": "\"sunny\""}]
            })
        );
    }

    #[test]
    fn test_consecutive_tool_results_merged() {
        let mut call = weather_call();
        call.content = Some("Checking both.".into());
        call.tool_calls
            .as_mut()
            .unwrap()
            .push(ToolCall::new("toolu_2", "get_weather", r#"{"location": "Rome"}"#));

        let (_, messages) = convert_request(&[
            Message::user("Paris and Rome?"),
            call.into(),
            Message::tool_result("toolu_1", "get_weather", "\"sunny\""),
            Message::tool_result("toolu_2", "get_weather", "\"rainy\""),
        ])
        .unwrap();

        assert_eq!(messages.len(), 3);
        match &messages[1].content {
            MessageContent::Blocks(blocks) => {
                assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "Checking both."));
                assert_eq!(blocks.len(), 3);
            }
            other => panic!("Expected blocks, got {other:?}"),
        }
        match &messages[2].content {
            MessageContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            other => panic!("Expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let bad = AssistantMessage::tool_calls(vec![ToolCall::new("t", "f", "not json")]);
        assert!(convert_request(&[bad.into()]).is_err());
    }

    #[test]
    fn test_blank_arguments_become_empty_input() {
        let call = AssistantMessage::tool_calls(vec![ToolCall::new("toolu_1", "list_cities", "")]);
        let (_, messages) = convert_request(&[call.into()]).unwrap();
        match &messages[0].content {
            MessageContent::Blocks(blocks) => assert_eq!(
                blocks[0],
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "list_cities".into(),
                    input: json!({}),
                }
            ),
            other => panic!("Expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn test_convert_tools() {
        let tools = convert_tools(&[ToolDefinition::new(
            "get_weather",
            "Get the weather.",
            json!({
                "type": "object",
                "properties": {"location": {"type": "string", "description": "City"}},
                "required": ["location"]
            }),
        )]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_weather");
        assert_eq!(tools[0].description, "Get the weather.");
        assert_eq!(
            tools[0].input_schema,
            json!({
                "type": "object",
                "properties": {"location": {"type": "string", "description": "City"}},
                "required": ["location"]
            })
        );
    }

    #[test]
    fn test_convert_normal_response() {
        let raw: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [{"type": "text", "text": "Hello there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        let resp = convert_response(raw);

        assert_eq!(resp.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(resp.message().unwrap().content.as_deref(), Some("Hello there"));
        assert_eq!(resp.usage, Some(Usage::new(10, 5)));
    }

    #[test]
    fn test_convert_response_with_every_tool_use() {
        let raw: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "Two cities.", "signature": "sig"},
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Paris"}},
                {"type": "tool_use", "id": "toolu_2", "name": "get_weather", "input": {"location": "Rome"}}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();
        let resp = convert_response(raw);

        assert!(resp.requests_tools());
        let msg = resp.message().unwrap();
        assert_eq!(msg.content.as_deref(), Some("Let me check."));
        assert_eq!(msg.reasoning_content.as_deref(), Some("Two cities."));
        assert_eq!(resp.tool_calls().len(), 2);
        assert_eq!(resp.tool_calls()[1].id, "toolu_2");
        let args: Value = serde_json::from_str(&resp.tool_calls()[0].function.arguments).unwrap();
        assert_eq!(args, json!({"location": "Paris"}));
    }

    #[test]
    fn test_max_tokens_stop_reason() {
        let raw: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "cut"}],
            "stop_reason": "max_tokens"
        }))
        .unwrap();
        assert_eq!(convert_response(raw).finish_reason(), Some(FinishReason::Length));
    }

    #[tokio::test]
    async fn test_completion_against_mock_server() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-3-5-sonnet-20241022",
                "max_tokens": 4096,
                "system": "Be brief."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_abc",
                "content": [{"type": "text", "text": "Hi!"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 3, "output_tokens": 2}
            })))
            .mount(&mock_server)
            .await;

        let config = ProviderConfig {
            api_key: "sk-ant-test".into(),
            api_base: Some(mock_server.uri()),
            ..Default::default()
        };
        let provider = AnthropicProvider::new(&config, find_by_name("anthropic").unwrap()).unwrap();
        let resp = provider
            .create_completion(
                "claude-3-5-sonnet-20241022",
                &[Message::system("Be brief."), Message::user("Hello")],
                &CompletionOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(resp.message().unwrap().content.as_deref(), Some("Hi!"));
        assert_eq!(resp.usage.unwrap().total_tokens, 5);
        assert_eq!(provider.name(), "Anthropic");
    }
}
