//! Tool registry and executor.
//!
//! Registration happens once, before the conversation starts. Execution
//! walks the model's tool calls strictly in order and stops at the first
//! failure.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use omnichat_core::{AssistantMessage, Error, Message, Result, ToolCall, ToolDefinition, ToolSpec};

use super::base::Tool;

/// Raw result of one executed tool call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub name: String,
    pub content: Value,
}

/// Results of one batch of tool calls, index-aligned with the input calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolExecution {
    pub results: Vec<ToolOutput>,
    pub messages: Vec<Message>,
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Tools keyed by name, in registration order.
#[derive(Clone, Default)]
pub struct Tools {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for Tools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tools").field("tools", &self.tool_names()).finish()
    }
}

impl Tools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            info!(tool = %name, "replaced tool");
        } else {
            info!(tool = %name, "registered tool");
        }
        self.tools.insert(name, tool);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of every registered tool, in the OpenAI wire format.
    pub fn tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Raw specs of every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec().clone()).collect()
    }

    /// Execute `calls` in order and build one tool message per call.
    ///
    /// The first failing call aborts the batch: unparseable arguments,
    /// unknown tool, invalid arguments, or a handler error.
    pub async fn execute_tool(&self, calls: &[ToolCall]) -> Result<ToolExecution> {
        let mut execution = ToolExecution::default();

        for call in calls {
            let name = &call.function.name;
            let args = parse_arguments(name, &call.function.arguments)?;

            let tool = self.tools.get(name).ok_or_else(|| {
                warn!(tool = %name, "tool not registered");
                Error::ToolNotRegistered(name.clone())
            })?;

            let validated = tool.validate(args).map_err(|detail| Error::ToolValidation {
                tool: name.clone(),
                detail,
            })?;

            debug!(tool = %name, call_id = %call.id, "executing tool");
            let content = tool.call(validated).await.map_err(|source| {
                warn!(tool = %name, error = %source, "tool execution failed");
                Error::ToolFailed {
                    tool: name.clone(),
                    source,
                }
            })?;

            execution.messages.push(Message::tool_result(
                call.id.clone(),
                name.clone(),
                content.to_string(),
            ));
            execution.results.push(ToolOutput {
                tool_call_id: call.id.clone(),
                name: name.clone(),
                content,
            });
        }

        Ok(execution)
    }

    /// Like [`execute_tool`](Self::execute_tool), returning only the raw results.
    pub async fn execute(&self, calls: &[ToolCall]) -> Result<Vec<Value>> {
        let execution = self.execute_tool(calls).await?;
        Ok(execution.results.into_iter().map(|r| r.content).collect())
    }

    /// Turn previously computed results into tool messages, matched to the
    /// assistant's tool calls by id. Calls without a result are skipped.
    pub fn results_to_messages(results: &[ToolOutput], assistant: &AssistantMessage) -> Vec<Message> {
        assistant
            .calls()
            .iter()
            .filter_map(|call| {
                let result = results.iter().find(|r| r.tool_call_id == call.id)?;
                Some(Message::tool_result(
                    call.id.clone(),
                    call.function.name.clone(),
                    result.content.to_string(),
                ))
            })
            .collect()
    }
}

/// Empty argument text means "no arguments".
fn parse_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str::<Map<String, Value>>(raw).map_err(|source| Error::ToolArgument {
        tool: tool.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FunctionTool, ParamType};

    fn temperature_tool() -> FunctionTool {
        FunctionTool::builder("get_current_temperature")
            .doc("Gets temperature.")
            .param("location", ParamType::String)
            .param_with_default("unit", ParamType::String, "Celsius")
            .sync_handler(|args| {
                Ok(format!(
                    "72 {} in {}",
                    args.require_str("unit")?,
                    args.require_str("location")?
                ))
            })
            .unwrap()
    }

    fn divide_tool() -> FunctionTool {
        FunctionTool::builder("divide")
            .param("a", ParamType::Number)
            .param("b", ParamType::Number)
            .sync_handler(|args| {
                let b = args.require_f64("b")?;
                anyhow::ensure!(b != 0.0, "division by zero");
                Ok(args.require_f64("a")? / b)
            })
            .unwrap()
    }

    fn registry() -> Tools {
        Tools::new().with_tool(temperature_tool()).with_tool(divide_tool())
    }

    #[tokio::test]
    async fn test_execute_builds_aligned_messages() {
        let calls = vec![
            ToolCall::new("call_1", "get_current_temperature", r#"{"location": "Paris"}"#),
            ToolCall::new("call_2", "divide", r#"{"a": 9, "b": "3"}"#),
        ];

        let execution = registry().execute_tool(&calls).await.unwrap();

        assert_eq!(execution.results.len(), 2);
        assert_eq!(execution.results[0].content, Value::from("72 Celsius in Paris"));
        assert_eq!(execution.results[1].content, Value::from(3.0));

        let ids: Vec<_> = execution
            .messages
            .iter()
            .map(|m| match m {
                Message::Tool(t) => t.tool_call_id.as_str(),
                other => panic!("unexpected message {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["call_1", "call_2"]);
        assert_eq!(execution.messages[0].content(), Some("\"72 Celsius in Paris\""));
    }

    #[tokio::test]
    async fn test_wrong_argument_type_names_tool() {
        let calls = vec![ToolCall::new(
            "call_1",
            "get_current_temperature",
            r#"{"location": 123}"#,
        )];

        let err = registry().execute_tool(&calls).await.unwrap_err();
        match &err {
            Error::ToolValidation { tool, detail } => {
                assert_eq!(tool, "get_current_temperature");
                assert!(detail.contains("location"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err
            .to_string()
            .starts_with("Error in tool 'get_current_temperature' parameters"));
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts() {
        let calls = vec![
            ToolCall::new("call_1", "missing", "{}"),
            ToolCall::new("call_2", "divide", r#"{"a": 1, "b": 1}"#),
        ];
        let err = registry().execute_tool(&calls).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotRegistered(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_unparseable_arguments() {
        let calls = vec![ToolCall::new("call_1", "divide", "[1, 2]")];
        let err = registry().execute_tool(&calls).await.unwrap_err();
        assert!(matches!(err, Error::ToolArgument { .. }));
    }

    #[tokio::test]
    async fn test_empty_arguments_use_defaults() {
        let tool = FunctionTool::builder("ping")
            .param_with_default("target", ParamType::String, "localhost")
            .sync_handler(|args| Ok(args.require_str("target")?.to_string()))
            .unwrap();
        let tools = Tools::new().with_tool(tool);

        let out = tools
            .execute(&[ToolCall::new("call_1", "ping", "")])
            .await
            .unwrap();
        assert_eq!(out, vec![Value::from("localhost")]);
    }

    #[tokio::test]
    async fn test_handler_error_is_source() {
        let calls = vec![ToolCall::new("call_1", "divide", r#"{"a": 1, "b": 0}"#)];
        let err = registry().execute_tool(&calls).await.unwrap_err();
        match err {
            Error::ToolFailed { tool, source } => {
                assert_eq!(tool, "divide");
                assert_eq!(source.to_string(), "division by zero");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_not_deduplicated() {
        let calls = vec![
            ToolCall::new("same", "divide", r#"{"a": 4, "b": 2}"#),
            ToolCall::new("same", "divide", r#"{"a": 9, "b": 3}"#),
        ];
        let out = registry().execute(&calls).await.unwrap();
        assert_eq!(out, vec![Value::from(2.0), Value::from(3.0)]);
    }

    #[test]
    fn test_last_registration_wins() {
        let replacement = FunctionTool::builder("divide")
            .doc("Integer division.")
            .param("a", ParamType::Integer)
            .sync_handler(|_| Ok(0))
            .unwrap();
        let tools = registry().with_tool(replacement);

        assert_eq!(tools.len(), 2);
        assert_eq!(tools.tool_names(), vec!["get_current_temperature", "divide"]);
        let spec = &tools.specs()[1];
        assert_eq!(spec.description, "Integer division.");
        assert_eq!(spec.parameters.required, vec!["a"]);
    }

    #[test]
    fn test_wire_definitions() {
        let defs = registry().tools();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].tool_type, "function");
        assert_eq!(defs[0].function.name, "get_current_temperature");
        assert_eq!(defs[0].function.parameters["required"], serde_json::json!(["location"]));
    }

    #[test]
    fn test_results_to_messages_matches_by_id() {
        let assistant = AssistantMessage::tool_calls(vec![
            ToolCall::new("a", "divide", "{}"),
            ToolCall::new("b", "divide", "{}"),
        ]);
        let results = vec![ToolOutput {
            tool_call_id: "b".into(),
            name: "divide".into(),
            content: Value::from(1),
        }];

        let messages = Tools::results_to_messages(&results, &assistant);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::Tool(t) => {
                assert_eq!(t.tool_call_id, "b");
                assert_eq!(t.content, "1");
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
