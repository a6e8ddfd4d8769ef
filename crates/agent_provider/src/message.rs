//! Conversation data model shared by the orchestrator, the session store, and
//! display layers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Tool input arguments as produced by the model client.
pub type ToolInput = Map<String, Value>;

/// Returns a fresh message/session identifier.
#[must_use]
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Token counts reported by a model client. Absent fields count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

impl TokenUsage {
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
        }
    }

    /// Adds `other` into `self` field by field.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens = Some(
            self.input_tokens
                .unwrap_or(0)
                .saturating_add(other.input_tokens.unwrap_or(0)),
        );
        self.output_tokens = Some(
            self.output_tokens
                .unwrap_or(0)
                .saturating_add(other.output_tokens.unwrap_or(0)),
        );
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens
            .unwrap_or(0)
            .saturating_add(self.output_tokens.unwrap_or(0))
    }
}

/// One tool invocation requested by the model. `id` pairs it with its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: ToolInput,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: ToolInput) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolResult {
    #[must_use]
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            is_error: true,
            ..Self::new(tool_call_id, tool_name, output)
        }
    }
}

/// A conversation message. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_results: None,
            usage: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Builds a `tool` message bundling one round of results.
    #[must_use]
    pub fn tool(results: Vec<ToolResult>) -> Self {
        Self {
            tool_results: Some(results),
            ..Self::new(Role::Tool, "")
        }
    }

    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Total tokens recorded on this message, zero when no usage is attached.
    #[must_use]
    pub fn token_total(&self) -> u64 {
        self.usage.as_ref().map_or(0, TokenUsage::total)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn usage_accumulates_with_absent_fields_as_zero() {
        let mut total = TokenUsage::default();
        total.accumulate(&TokenUsage {
            input_tokens: Some(10),
            output_tokens: None,
        });
        total.accumulate(&TokenUsage::new(5, 7));

        assert_eq!(total, TokenUsage::new(15, 7));
        assert_eq!(total.total(), 22);
    }

    #[test]
    fn fresh_messages_get_distinct_ids() {
        let first = Message::user("hello");
        let second = Message::user("hello");

        assert_ne!(first.id, second.id);
        assert_eq!(first.role, Role::User);
        assert_eq!(first.token_total(), 0);
    }

    #[test]
    fn message_serializes_without_empty_optionals() {
        let message = Message::assistant("done").with_usage(TokenUsage::new(1, 2));
        let value = serde_json::to_value(&message).expect("message should serialize");

        assert_eq!(value["role"], "assistant");
        assert_eq!(value["usage"], json!({"input_tokens": 1, "output_tokens": 2}));
        assert!(value.get("tool_calls").is_none());
        assert!(value.get("tool_results").is_none());

        let parsed: Message = serde_json::from_value(value).expect("message should parse");
        assert_eq!(parsed, message);
    }

    #[test]
    fn tool_message_carries_results_and_error_flag() {
        let message = Message::tool(vec![
            ToolResult::new("call-1", "read", "contents"),
            ToolResult::error("call-2", "bash", "Exit code: 1"),
        ]);

        let results = message.tool_results.as_deref().expect("results present");
        assert_eq!(message.role, Role::Tool);
        assert!(!results[0].is_error);
        assert!(results[1].is_error);
    }
}
