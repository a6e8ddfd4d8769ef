//! The agent orchestration loop.
//!
//! One [`Agent::run`] call drives up to `max_rounds` rounds of "stream the
//! model, then run the tools it asked for", reporting progress through
//! [`AgentCallbacks`]. The agent never mutates the caller's messages; it
//! builds its own model-facing transcript and hands back a finished assistant
//! [`Message`] through `on_complete`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use agent_provider::{
    Message, ModelClient, ModelMessage, ModelRequest, ModelToolSchema, ProviderProfile,
    StreamEvent, TokenUsage, ToolCall, ToolInput, ToolResult, ToolResultPart,
};
use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use tokio::sync::watch;

use crate::config::Config;
use crate::error::AgentError;
use crate::permission::{PermissionChecker, PermissionStatus};
use crate::prompt::{build_system_prompt, PromptContext};
use crate::registry::{ModelTool, ToolRegistry};
use crate::streaming::merge_stream_text;
use crate::transcript::to_model_messages;

pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    Idle,
    Thinking,
    Streaming,
    ToolCalling,
    WaitingPermission,
    Error,
}

impl AgentState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Streaming => "streaming",
            Self::ToolCalling => "tool_calling",
            Self::WaitingPermission => "waiting_permission",
            Self::Error => "error",
        }
    }
}

/// Everything a run reports back to its caller.
///
/// Only `on_permission_request` suspends the run; the others must return
/// promptly.
#[async_trait]
pub trait AgentCallbacks: Send + Sync {
    /// Raw text event as received from the model.
    fn on_text_delta(&self, delta: &str);
    fn on_tool_call(&self, name: &str, input: &ToolInput);
    fn on_tool_result(&self, name: &str, output: &str);
    fn on_complete(&self, message: Message);
    fn on_error(&self, error: AgentError);
    async fn on_permission_request(&self, name: &str, input: &ToolInput) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub model_id: String,
    pub max_output_tokens: u32,
    pub max_rounds: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model_id: "mock".to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl AgentSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model_id: config.model.clone(),
            max_output_tokens: config.max_tokens,
            max_rounds: config.max_rounds,
        }
    }
}

/// Result of consuming one model stream.
struct RoundOutput {
    text: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<TokenUsage>,
}

pub struct Agent {
    client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    permissions: PermissionChecker,
    settings: AgentSettings,
    prompt: PromptContext,
    state: watch::Sender<AgentState>,
}

impl Agent {
    #[must_use]
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        permissions: PermissionChecker,
        settings: AgentSettings,
    ) -> Self {
        let (state, _) = watch::channel(AgentState::Idle);
        Self {
            client,
            tools,
            permissions,
            settings,
            prompt: PromptContext::default(),
            state,
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptContext) -> Self {
        self.prompt = prompt;
        self
    }

    #[must_use]
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn profile(&self) -> ProviderProfile {
        self.client.profile()
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Registered tools that will stop for confirmation: gated, flagged in
    /// `always_ask`, and not auto-approved.
    #[must_use]
    pub fn tools_asking_first(&self) -> Vec<&str> {
        self.tools
            .list()
            .into_iter()
            .filter(|definition| definition.requires_permission)
            .map(|definition| definition.name.as_str())
            .filter(|name| {
                self.permissions.always_asks(name)
                    && self.permissions.check(name) == PermissionStatus::Pending
            })
            .collect()
    }

    /// Runs the round loop over an immutable snapshot of `messages`.
    ///
    /// Exactly one of `on_complete` or `on_error` fires per call.
    pub async fn run(&self, messages: &[Message], callbacks: &dyn AgentCallbacks) {
        self.set_state(AgentState::Thinking);
        tracing::info!(
            model = %self.settings.model_id,
            messages = messages.len(),
            "agent run started"
        );

        let outcome = AssertUnwindSafe(self.run_rounds(messages, callbacks))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(AgentError::from_panic(payload.as_ref())),
        };

        match result {
            Ok(message) => {
                tracing::info!(tokens = message.token_total(), "agent run finished");
                self.set_state(AgentState::Idle);
                callbacks.on_complete(message);
            }
            Err(error) => {
                tracing::error!(%error, "agent run failed");
                self.set_state(AgentState::Error);
                callbacks.on_error(error);
            }
        }
    }

    async fn run_rounds(
        &self,
        messages: &[Message],
        callbacks: &dyn AgentCallbacks,
    ) -> Result<Message, AgentError> {
        let system_prompt = build_system_prompt(&self.prompt);
        let model_tools = self.tools.to_model_tools();
        let tool_schemas: Vec<ModelToolSchema> =
            model_tools.iter().map(|tool| tool.schema.clone()).collect();
        let mut transcript = to_model_messages(messages);

        let mut full_text = String::new();
        let mut usage = TokenUsage::new(0, 0);
        let mut finished = false;

        for round in 0..self.settings.max_rounds {
            self.set_state(AgentState::Streaming);
            let request = ModelRequest {
                model_id: self.settings.model_id.clone(),
                messages: transcript.clone(),
                system_prompt: system_prompt.clone(),
                tools: tool_schemas.clone(),
                max_output_tokens: self.settings.max_output_tokens,
            };

            let output = self.stream_round(request, callbacks).await?;
            if let Some(round_usage) = &output.usage {
                usage.accumulate(round_usage);
            }
            full_text.push_str(&output.text);

            if output.tool_calls.is_empty() {
                finished = true;
                break;
            }

            tracing::debug!(round, calls = output.tool_calls.len(), "running tool calls");
            transcript.push(ModelMessage::assistant_with_tool_calls(
                &output.text,
                &output.tool_calls,
            ));
            self.set_state(AgentState::ToolCalling);

            let mut results = Vec::with_capacity(output.tool_calls.len());
            for call in &output.tool_calls {
                let result = self.execute_call(call, &model_tools, callbacks).await;
                callbacks.on_tool_result(&call.name, &result.output);
                results.push(ToolResultPart::from(result));
            }
            transcript.push(ModelMessage::Tool { content: results });
        }

        if !finished {
            tracing::warn!(
                max_rounds = self.settings.max_rounds,
                "round limit reached, completing with accumulated text"
            );
        }

        Ok(Message::assistant(full_text).with_usage(usage))
    }

    async fn stream_round(
        &self,
        request: ModelRequest,
        callbacks: &dyn AgentCallbacks,
    ) -> Result<RoundOutput, AgentError> {
        let mut stream = self.client.stream(request).await?;

        let mut deltas = String::new();
        let mut final_text = None;
        let mut tool_calls = Vec::new();
        let mut usage = None;

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    deltas = merge_stream_text(&deltas, &text);
                    callbacks.on_text_delta(&text);
                }
                StreamEvent::ToolCall(call) => {
                    tracing::debug!(tool = %call.name, id = %call.id, "tool call received");
                    callbacks.on_tool_call(&call.name, &call.input);
                    tool_calls.push(call);
                }
                StreamEvent::Error { message } => return Err(AgentError::Stream(message)),
                StreamEvent::Finish { text, usage: reported } => {
                    final_text = Some(text);
                    usage = Some(reported);
                }
            }
        }

        Ok(RoundOutput {
            text: final_text.unwrap_or(deltas),
            tool_calls,
            usage,
        })
    }

    /// Produces the model-visible result for one call.
    async fn execute_call(
        &self,
        call: &ToolCall,
        model_tools: &[ModelTool],
        callbacks: &dyn AgentCallbacks,
    ) -> ToolResult {
        let refuse = |text: String| ToolResult::error(call.id.clone(), call.name.clone(), text);

        let Some(tool) = model_tools
            .iter()
            .find(|tool| tool.definition().name == call.name)
        else {
            tracing::debug!(tool = %call.name, "unknown tool requested");
            return refuse(format!("Error: unknown tool \"{}\"", call.name));
        };

        if tool.definition().requires_permission {
            match self.permissions.check(&call.name) {
                PermissionStatus::Approved => {}
                PermissionStatus::Denied => return refuse("Permission denied".to_string()),
                PermissionStatus::Pending => {
                    self.set_state(AgentState::WaitingPermission);
                    let approved = callbacks.on_permission_request(&call.name, &call.input).await;
                    self.set_state(AgentState::ToolCalling);
                    if !approved {
                        return refuse("Permission denied by user".to_string());
                    }
                }
            }
        }

        tool.call(call).await
    }

    fn set_state(&self, state: AgentState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_are_snake_case() {
        let names: Vec<&str> = [
            AgentState::Idle,
            AgentState::Thinking,
            AgentState::Streaming,
            AgentState::ToolCalling,
            AgentState::WaitingPermission,
            AgentState::Error,
        ]
        .into_iter()
        .map(AgentState::as_str)
        .collect();

        assert_eq!(
            names,
            vec![
                "idle",
                "thinking",
                "streaming",
                "tool_calling",
                "waiting_permission",
                "error"
            ]
        );
    }

    #[test]
    fn settings_follow_config() {
        let config = Config {
            model: "big-model".to_string(),
            max_tokens: 1024,
            max_rounds: 3,
            ..Config::default()
        };

        assert_eq!(
            AgentSettings::from_config(&config),
            AgentSettings {
                model_id: "big-model".to_string(),
                max_output_tokens: 1024,
                max_rounds: 3,
            }
        );
    }
}
