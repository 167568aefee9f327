//! Normalized message and response model.
//!
//! Every vendor adapter converts its wire format into these types on ingress,
//! so nothing downstream ever branches on "is this a map or an object".
//! Field names follow the OpenAI chat completions format.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// A chat message. The variant is the `role` field on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },

    User { content: String },

    Assistant(AssistantMessage),

    Tool(ToolMessage),
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage::text(content))
    }

    /// Create a tool result message answering the call `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool(ToolMessage {
            name: name.into(),
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        })
    }

    /// The wire `role` of this message.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant(_) => "assistant",
            Message::Tool(_) => "tool",
        }
    }

    /// Text content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content } | Message::User { content } => Some(content),
            Message::Assistant(msg) => msg.content.as_deref(),
            Message::Tool(msg) => Some(&msg.content),
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(msg: AssistantMessage) -> Self {
        Message::Assistant(msg)
    }
}

impl From<ToolMessage> for Message {
    fn from(msg: ToolMessage) -> Self {
        Message::Tool(msg)
    }
}

/// The assistant side of a turn: text, tool calls, or both.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning/thinking text, either vendor-provided or extracted from `<think>` tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

impl AssistantMessage {
    /// Plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        AssistantMessage {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Reply that only requests tool calls.
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        AssistantMessage {
            tool_calls: Some(tool_calls),
            ..Default::default()
        }
    }

    /// The requested tool calls, empty if none.
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.calls().is_empty()
    }
}

/// Result of one tool call, fed back to the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolMessage {
    /// Name of the tool that produced this result.
    #[serde(default)]
    pub name: String,
    /// JSON-encoded return value.
    pub content: String,
    /// Id of the `ToolCall` this message answers.
    pub tool_call_id: String,
}

// ─────────────────────────────────────────────
// Tool Calls (function calling)
// ─────────────────────────────────────────────

/// A tool call from the assistant, requesting execution of a function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Vendor-assigned id, used to match the result message.
    pub id: String,
    /// Always "function".
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// The function name and arguments within a tool call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments object.
    pub arguments: String,
}

// ─────────────────────────────────────────────
// Tool Definitions (for LLM requests)
// ─────────────────────────────────────────────

/// Wire advertisement of a tool: `{"type": "function", "function": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        ToolDefinition {
            tool_type: function_type(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Structured description of a tool's parameters.
///
/// Used both for the model-facing advertisement and for argument validation.
/// Derived once at registration and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSchema,
}

impl ToolSpec {
    /// Wrap this spec in the OpenAI tool wire format.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name.clone(),
            self.description.clone(),
            serde_json::to_value(&self.parameters).unwrap_or(Value::Null),
        )
    }
}

/// `{"type": "object", "properties": {...}, "required": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParametersSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Properties in declaration order.
    pub properties: IndexMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl Default for ParametersSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: IndexMap::new(),
            required: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PropertySchema {
    /// JSON-Schema type name (`string`, `integer`, `number`, `boolean`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Element schema for `array` properties, carried through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

impl PropertySchema {
    pub fn new(kind: impl Into<String>) -> Self {
        PropertySchema {
            kind: kind.into(),
            enum_values: None,
            description: String::new(),
            default: None,
            items: None,
        }
    }
}

// ─────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

impl FinishReason {
    /// Map a vendor stop reason onto the normalized set. Unknown reasons map to `Stop`.
    pub fn from_vendor(reason: &str) -> Self {
        match reason {
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

/// Token usage statistics.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// The single populated choice of a normalized response.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    pub message: AssistantMessage,
    pub finish_reason: Option<FinishReason>,
    /// Full transcript of a multi-turn run (assistant and tool turns).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediate_messages: Vec<Message>,
}

/// Normalized response returned by every adapter and by the client.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
    /// Every non-final response of a multi-turn run, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediate_responses: Vec<ChatCompletionResponse>,
}

impl ChatCompletionResponse {
    /// Build a one-choice response.
    pub fn new(message: AssistantMessage, finish_reason: FinishReason) -> Self {
        ChatCompletionResponse {
            choices: vec![Choice {
                message,
                finish_reason: Some(finish_reason),
                intermediate_messages: Vec::new(),
            }],
            ..Default::default()
        }
        .normalize()
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Collapse to the first choice and make `finish_reason` agree with the tool calls.
    ///
    /// A choice carrying tool calls always reports `tool_calls`, whatever the
    /// vendor said; a missing reason on a plain reply becomes `stop`.
    pub fn normalize(mut self) -> Self {
        self.choices.truncate(1);
        if let Some(choice) = self.choices.first_mut() {
            if choice.message.has_tool_calls() {
                choice.finish_reason = Some(FinishReason::ToolCalls);
            } else if choice.finish_reason.is_none() {
                choice.finish_reason = Some(FinishReason::Stop);
            }
        }
        self
    }

    pub fn choice(&self) -> Option<&Choice> {
        self.choices.first()
    }

    pub fn choice_mut(&mut self) -> Option<&mut Choice> {
        self.choices.first_mut()
    }

    pub fn message(&self) -> Option<&AssistantMessage> {
        self.choice().map(|c| &c.message)
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choice().and_then(|c| c.finish_reason)
    }

    /// Tool calls requested by the first choice, empty if none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message().map(|m| m.calls()).unwrap_or_default()
    }

    /// Whether the model stopped to request tools.
    pub fn requests_tools(&self) -> bool {
        self.finish_reason() == Some(FinishReason::ToolCalls) && !self.tool_calls().is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_message_serialization() {
        let json = serde_json::to_value(Message::system("You are helpful.")).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "You are helpful."}));
    }

    #[test]
    fn test_assistant_text_message_omits_empty_fields() {
        let json = serde_json::to_value(Message::assistant("The answer is 42.")).unwrap();

        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "The answer is 42.");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("reasoning_content").is_none());
    }

    #[test]
    fn test_assistant_tool_calls_serialization() {
        let msg: Message = AssistantMessage::tool_calls(vec![ToolCall::new(
            "call_123",
            "get_weather",
            r#"{"location": "Paris"}"#,
        )])
        .into();
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "assistant");
        assert!(json["content"].is_null());
        let calls = json["tool_calls"].as_array().unwrap();
        assert_eq!(calls[0]["id"], "call_123");
        assert_eq!(calls[0]["type"], "function");
        assert_eq!(calls[0]["function"]["name"], "get_weather");
        assert_eq!(calls[0]["function"]["arguments"], r#"{"location": "Paris"}"#);
    }

    #[test]
    fn test_tool_result_wire_format() {
        let msg = Message::tool_result("call_123", "get_weather", "\"sunny\"");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            json,
            json!({
                "role": "tool",
                "name": "get_weather",
                "content": "\"sunny\"",
                "tool_call_id": "call_123"
            })
        );
    }

    #[test]
    fn test_assistant_with_tool_calls_deserialization() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "read_file", "arguments": "{\"path\": \"/tmp/a\"}"}
            }]
        }))
        .unwrap();

        match msg {
            Message::Assistant(a) => {
                assert!(a.content.is_none());
                assert_eq!(a.calls().len(), 1);
                assert_eq!(a.calls()[0].function.name, "read_file");
            }
            other => panic!("Expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_call_type_defaults_to_function() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "c1",
            "function": {"name": "f", "arguments": "{}"}
        }))
        .unwrap();
        assert_eq!(call.call_type, "function");
    }

    #[test]
    fn test_transcript_round_trip() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("What is 2+2?"),
            AssistantMessage::tool_calls(vec![ToolCall::new("c1", "add", r#"{"a":2,"b":2}"#)]).into(),
            Message::tool_result("c1", "add", "4"),
            Message::assistant("4"),
        ];

        let text = serde_json::to_string(&messages).unwrap();
        let back: Vec<Message> = serde_json::from_str(&text).unwrap();
        assert_eq!(messages, back);
    }

    #[test]
    fn test_tool_spec_to_definition() {
        let mut parameters = ParametersSchema::default();
        parameters
            .properties
            .insert("location".into(), PropertySchema::new("string"));
        parameters.required.push("location".into());
        let spec = ToolSpec {
            name: "get_weather".into(),
            description: "Get the weather.".into(),
            parameters,
        };

        let json = serde_json::to_value(spec.to_definition()).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Get the weather.",
                    "parameters": {
                        "type": "object",
                        "properties": {"location": {"type": "string", "description": ""}},
                        "required": ["location"]
                    }
                }
            })
        );
    }

    #[test]
    fn test_finish_reason_vendor_mapping() {
        assert_eq!(FinishReason::from_vendor("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_vendor("max_tokens"), FinishReason::Length);
        assert_eq!(FinishReason::from_vendor("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_vendor("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_vendor("content_filter"), FinishReason::ContentFilter);
        assert_eq!(FinishReason::from_vendor("something_new"), FinishReason::Stop);
    }

    #[test]
    fn test_normalize_collapses_to_first_choice() {
        let resp = ChatCompletionResponse {
            choices: vec![
                Choice {
                    message: AssistantMessage::text("first"),
                    ..Default::default()
                },
                Choice {
                    message: AssistantMessage::text("second"),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
        .normalize();

        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.message().unwrap().content.as_deref(), Some("first"));
        assert_eq!(resp.finish_reason(), Some(FinishReason::Stop));
    }

    #[test]
    fn test_normalize_forces_tool_calls_reason() {
        let resp = ChatCompletionResponse::new(
            AssistantMessage::tool_calls(vec![ToolCall::new("c1", "f", "{}")]),
            FinishReason::Stop,
        );
        assert_eq!(resp.finish_reason(), Some(FinishReason::ToolCalls));
        assert!(resp.requests_tools());
    }

    #[test]
    fn test_tool_calls_reason_without_calls_does_not_request_tools() {
        let resp = ChatCompletionResponse::new(AssistantMessage::text("hi"), FinishReason::ToolCalls);
        assert!(!resp.requests_tools());
        assert!(resp.tool_calls().is_empty());
    }

    #[test]
    fn test_usage_totals() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_empty_response_has_no_message() {
        let resp = ChatCompletionResponse::default();
        assert!(resp.message().is_none());
        assert!(resp.tool_calls().is_empty());
        assert!(!resp.requests_tools());
    }
}
