//! Projection of stored conversation messages into model turns.

use agent_provider::{Message, ModelMessage, Role, ToolResultPart};

/// Projects `messages` into the model-facing transcript.
///
/// System messages are display-only and are dropped. Tool messages without
/// results carry nothing for the model and are dropped too.
#[must_use]
pub fn to_model_messages(messages: &[Message]) -> Vec<ModelMessage> {
    messages.iter().filter_map(to_model_message).collect()
}

fn to_model_message(message: &Message) -> Option<ModelMessage> {
    match message.role {
        Role::System => None,
        Role::User => Some(ModelMessage::user(message.content.clone())),
        Role::Tool => message.tool_results.as_ref().map(|results| ModelMessage::Tool {
            content: results.iter().cloned().map(ToolResultPart::from).collect(),
        }),
        Role::Assistant => match message.tool_calls.as_deref() {
            Some(calls) if !calls.is_empty() => Some(ModelMessage::assistant_with_tool_calls(
                &message.content,
                calls,
            )),
            _ => Some(ModelMessage::assistant_text(message.content.clone())),
        },
    }
}

#[cfg(test)]
mod tests {
    use agent_provider::{AssistantPart, ToolCall, ToolInput, ToolResult};

    use super::*;

    #[test]
    fn system_messages_never_reach_the_model() {
        let projected = to_model_messages(&[
            Message::system("Session cleared"),
            Message::user("hi"),
            Message::system("/help output"),
        ]);

        assert_eq!(projected, vec![ModelMessage::user("hi")]);
    }

    #[test]
    fn tool_turns_are_re_expanded() {
        let call = ToolCall::new("c1", "read", ToolInput::new());
        let projected = to_model_messages(&[
            Message::user("read it"),
            Message::assistant("").with_tool_calls(vec![call.clone()]),
            Message::tool(vec![
                ToolResult::new("c1", "read", "contents"),
                ToolResult::error("c2", "bash", "Permission denied by user"),
            ]),
            Message::assistant("done"),
        ]);

        assert_eq!(
            projected,
            vec![
                ModelMessage::user("read it"),
                ModelMessage::Assistant {
                    content: vec![AssistantPart::ToolCall {
                        call_id: "c1".to_string(),
                        tool_name: "read".to_string(),
                        input: ToolInput::new(),
                    }],
                },
                ModelMessage::Tool {
                    content: vec![
                        ToolResultPart {
                            call_id: "c1".to_string(),
                            tool_name: "read".to_string(),
                            output: "contents".to_string(),
                            is_error: false,
                        },
                        ToolResultPart {
                            call_id: "c2".to_string(),
                            tool_name: "bash".to_string(),
                            output: "Permission denied by user".to_string(),
                            is_error: true,
                        },
                    ],
                },
                ModelMessage::assistant_text("done"),
            ]
        );
    }

    #[test]
    fn empty_tool_call_list_is_plain_text() {
        let projected = to_model_messages(&[Message::assistant("hello").with_tool_calls(Vec::new())]);

        assert_eq!(projected, vec![ModelMessage::assistant_text("hello")]);
    }

    #[test]
    fn tool_message_without_results_is_dropped() {
        let mut bare = Message::tool(Vec::new());
        bare.tool_results = None;

        assert!(to_model_messages(&[bare]).is_empty());
    }
}
