//! Model-facing wire shape and the streaming client contract.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{TokenUsage, ToolCall, ToolInput, ToolResult};
use crate::{ProviderError, ProviderProfile};

/// Part of an assistant turn as seen by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantPart {
    Text {
        text: String,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        input: ToolInput,
    },
}

/// One tool result paired to its call by `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultPart {
    pub call_id: String,
    pub tool_name: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl From<ToolResult> for ToolResultPart {
    fn from(result: ToolResult) -> Self {
        Self {
            call_id: result.tool_call_id,
            tool_name: result.tool_name,
            output: result.output,
            is_error: result.is_error,
        }
    }
}

/// Provider-neutral conversation turn. `system` messages never appear here;
/// the system prompt travels separately in [`ModelRequest::system_prompt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ModelMessage {
    User { content: String },
    Assistant { content: Vec<AssistantPart> },
    Tool { content: Vec<ToolResultPart> },
}

impl ModelMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![AssistantPart::Text { text: text.into() }],
        }
    }

    /// Builds an assistant turn with an optional leading text part followed by
    /// one part per tool call, in call order.
    #[must_use]
    pub fn assistant_with_tool_calls(text: &str, tool_calls: &[ToolCall]) -> Self {
        let mut content = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            content.push(AssistantPart::Text {
                text: text.to_string(),
            });
        }
        content.extend(tool_calls.iter().map(|call| AssistantPart::ToolCall {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            input: call.input.clone(),
        }));

        Self::Assistant { content }
    }

    /// Returns tool-call parts carried by an assistant turn.
    pub fn tool_call_parts(&self) -> impl Iterator<Item = &AssistantPart> {
        let parts: &[AssistantPart] = match self {
            Self::Assistant { content } => content,
            _ => &[],
        };
        parts
            .iter()
            .filter(|part| matches!(part, AssistantPart::ToolCall { .. }))
    }
}

/// Function-calling schema for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Input for one streamed model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model_id: String,
    pub messages: Vec<ModelMessage>,
    pub system_prompt: String,
    pub tools: Vec<ModelToolSchema>,
    pub max_output_tokens: u32,
}

/// Typed event yielded by a model stream.
///
/// A well-behaved stream ends with exactly one `Finish` carrying the client's
/// own full text for the call. `TextDelta` may be incremental or cumulative.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta { text: String },
    ToolCall(ToolCall),
    Error { message: String },
    Finish { text: String, usage: TokenUsage },
}

impl StreamEvent {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn finish(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self::Finish {
            text: text.into(),
            usage,
        }
    }
}

pub type ModelStream = BoxStream<'static, StreamEvent>;

/// Streaming language-model client.
#[async_trait]
pub trait ModelClient: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Issues one model call and returns its event stream.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        let mut input = Map::new();
        input.insert("path".to_string(), json!("README.md"));
        ToolCall::new(id, name, input)
    }

    #[test]
    fn assistant_with_tool_calls_omits_empty_text() {
        let message = ModelMessage::assistant_with_tool_calls("", &[call("c1", "read")]);

        let ModelMessage::Assistant { content } = &message else {
            panic!("expected assistant message");
        };
        assert_eq!(content.len(), 1);
        assert!(matches!(
            &content[0],
            AssistantPart::ToolCall { call_id, tool_name, .. } if call_id == "c1" && tool_name == "read"
        ));
    }

    #[test]
    fn assistant_with_tool_calls_keeps_text_first_and_call_order() {
        let message = ModelMessage::assistant_with_tool_calls(
            "looking",
            &[call("c1", "read"), call("c2", "grep")],
        );

        let ModelMessage::Assistant { content } = &message else {
            panic!("expected assistant message");
        };
        assert_eq!(
            content[0],
            AssistantPart::Text {
                text: "looking".to_string()
            }
        );
        let ids: Vec<&str> = message
            .tool_call_parts()
            .filter_map(|part| match part {
                AssistantPart::ToolCall { call_id, .. } => Some(call_id.as_str()),
                AssistantPart::Text { .. } => None,
            })
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn model_messages_serialize_with_role_tags() {
        let value = serde_json::to_value(ModelMessage::Tool {
            content: vec![
                ToolResult::new("c1", "read", "ok").into(),
                ToolResult::error("c2", "bash", "Exit code: 1").into(),
            ],
        })
        .expect("tool message should serialize");

        assert_eq!(value["role"], "tool");
        assert_eq!(value["content"][0]["call_id"], "c1");
        assert!(value["content"][0].get("is_error").is_none());
        assert_eq!(value["content"][1]["is_error"], true);
    }
}
