use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use agent_provider::{ModelToolSchema, ToolCall, ToolInput, ToolResult};
use async_trait::async_trait;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
}

impl ParameterKind {
    #[must_use]
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub requires_permission: bool,
}

impl ToolDefinition {
    /// JSON-schema object describing this tool's input.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for parameter in &self.parameters {
            properties.insert(
                parameter.name.clone(),
                json!({
                    "type": parameter.kind.json_type(),
                    "description": parameter.description,
                }),
            );
            if parameter.required {
                required.push(Value::String(parameter.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    #[must_use]
    pub fn model_schema(&self) -> ModelToolSchema {
        ModelToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Text shown to the model: `output`, else `error`, else empty.
    #[must_use]
    pub fn into_model_text(self) -> String {
        if !self.output.is_empty() {
            return self.output;
        }
        self.error.unwrap_or_default()
    }
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome;
}

#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    executor: Arc<dyn ToolExecutor>,
}

impl Tool {
    pub fn new(definition: ToolDefinition, executor: impl ToolExecutor + 'static) -> Self {
        Self {
            definition,
            executor: Arc::new(executor),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Runs the executor. A panic becomes a failed outcome.
    pub async fn invoke(&self, input: &ToolInput) -> ToolOutcome {
        match AssertUnwindSafe(self.executor.execute(input))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(tool = %self.definition.name, "tool executor panicked");
                ToolOutcome::fail(format!("Tool '{}' panicked", self.definition.name))
            }
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// A registered tool paired with its model-facing schema.
#[derive(Debug, Clone)]
pub struct ModelTool {
    pub schema: ModelToolSchema,
    tool: Tool,
}

impl ModelTool {
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        &self.tool.definition
    }

    /// Runs `call` and returns the model-visible result. Never fails; an
    /// unsuccessful outcome is flagged with `is_error`.
    pub async fn call(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.tool.invoke(&call.input).await;
        let success = outcome.success;
        let text = outcome.into_model_text();
        if success {
            ToolResult::new(call.id.clone(), call.name.clone(), text)
        } else {
            ToolResult::error(call.id.clone(), call.name.clone(), text)
        }
    }
}

/// Insertion-ordered set of tools keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Tool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tool`, replacing any earlier tool with the same name.
    pub fn register(&mut self, tool: Tool) {
        if self.tools.contains_key(tool.name()) {
            tracing::debug!(tool = %tool.name(), "replacing registered tool");
        }
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|tool| &tool.definition).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn to_model_tools(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                schema: tool.definition.model_schema(),
                tool: tool.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, input: &ToolInput) -> ToolOutcome {
            ToolOutcome::ok(
                input
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            )
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolExecutor for Failing {
        async fn execute(&self, _input: &ToolInput) -> ToolOutcome {
            ToolOutcome::fail("disk on fire")
        }
    }

    struct Panicking(AtomicUsize);

    #[async_trait]
    impl ToolExecutor for Panicking {
        async fn execute(&self, _input: &ToolInput) -> ToolOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("executor exploded");
        }
    }

    fn definition(name: &str, parameters: Vec<ToolParameter>) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("{name} tool"),
            parameters,
            requires_permission: false,
        }
    }

    fn input(value: Value) -> ToolInput {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn schema_lists_properties_and_required_names() {
        let definition = definition(
            "bash",
            vec![
                ToolParameter::required("command", ParameterKind::String, "shell command"),
                ToolParameter::optional("timeout", ParameterKind::Number, "ms"),
                ToolParameter::optional("verbose", ParameterKind::Boolean, "chatty"),
            ],
        );

        assert_eq!(
            definition.input_schema(),
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "shell command"},
                    "timeout": {"type": "number", "description": "ms"},
                    "verbose": {"type": "boolean", "description": "chatty"},
                },
                "required": ["command"],
            })
        );
    }

    #[test]
    fn register_overwrites_by_name_and_keeps_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new(definition("a", Vec::new()), Echo));
        registry.register(Tool::new(definition("b", Vec::new()), Echo));

        let mut replacement = definition("a", Vec::new());
        replacement.description = "second".to_string();
        registry.register(Tool::new(replacement, Failing));

        let names: Vec<&str> = registry.list().iter().map(|def| def.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("a").map(|tool| tool.definition.description.as_str()),
            Some("second")
        );
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn model_tool_call_turns_failures_into_text() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new(definition("echo", Vec::new()), Echo));
        registry.register(Tool::new(definition("fail", Vec::new()), Failing));

        let tools = registry.to_model_tools();
        assert_eq!(tools[0].schema.name, "echo");
        assert_eq!(tools[1].definition().name, "fail");

        let echoed = tools[0]
            .call(&ToolCall::new("c1", "echo", input(json!({"text": "hi"}))))
            .await;
        assert_eq!(echoed, ToolResult::new("c1", "echo", "hi"));

        let failed = tools[1]
            .call(&ToolCall::new("c2", "fail", ToolInput::new()))
            .await;
        assert_eq!(failed, ToolResult::error("c2", "fail", "disk on fire"));
    }

    #[tokio::test]
    async fn invoke_contains_executor_panics() {
        let tool = Tool::new(
            definition("boom", Vec::new()),
            Panicking(AtomicUsize::new(0)),
        );

        let outcome = tool.invoke(&ToolInput::new()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Tool 'boom' panicked"));
    }

    #[test]
    fn model_text_prefers_output_then_error() {
        let both = ToolOutcome {
            success: false,
            output: "partial".to_string(),
            error: Some("Exit code: 1".to_string()),
        };
        assert_eq!(both.into_model_text(), "partial");
        assert_eq!(ToolOutcome::fail("nope").into_model_text(), "nope");
        assert_eq!(
            ToolOutcome {
                success: true,
                output: String::new(),
                error: None,
            }
            .into_model_text(),
            ""
        );
    }
}
