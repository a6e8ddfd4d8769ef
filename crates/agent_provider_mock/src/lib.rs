//! Deterministic mock implementation of the shared `agent_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing. Each call to
//! [`ModelClient::stream`] consumes one scripted round of events; once the
//! script is exhausted the client echoes the latest user turn.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use agent_provider::{
    ModelClient, ModelMessage, ModelRequest, ModelStream, ProviderError, ProviderProfile,
    StreamEvent, TokenUsage, ToolCall, ToolInput,
};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

#[derive(Debug, Default)]
struct Script {
    rounds: VecDeque<Vec<StreamEvent>>,
    repeat: Option<Vec<StreamEvent>>,
}

impl Script {
    fn next_round(&mut self) -> Option<Vec<StreamEvent>> {
        self.rounds.pop_front().or_else(|| self.repeat.clone())
    }
}

/// Scripted model client used by `coding_agent` tests and offline runs.
#[derive(Debug)]
pub struct MockModelClient {
    model_id: String,
    script: Mutex<Script>,
    requests: Mutex<Vec<ModelRequest>>,
    event_delay: Option<Duration>,
}

impl MockModelClient {
    /// Creates a client that plays `rounds` in order, one per model call.
    #[must_use]
    pub fn new(rounds: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            model_id: MOCK_PROVIDER_ID.to_string(),
            script: Mutex::new(Script {
                rounds: rounds.into(),
                repeat: None,
            }),
            requests: Mutex::new(Vec::new()),
            event_delay: None,
        }
    }

    /// Creates a client that answers every model call with the same round.
    #[must_use]
    pub fn repeating(round: Vec<StreamEvent>) -> Self {
        let client = Self::new(Vec::new());
        lock_unpoisoned(&client.script).repeat = Some(round);
        client
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let trimmed = model_id.trim();
        if !trimmed.is_empty() {
            self.model_id = trimmed.to_string();
        }
        self
    }

    /// Sleeps before yielding each event, mimicking network pacing.
    #[must_use]
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = Some(delay);
        self
    }

    /// Returns every request received so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }
}

impl Default for MockModelClient {
    fn default() -> Self {
        Self::new(Vec::new()).with_event_delay(Duration::from_millis(Self::TOKEN_DELAY_MS))
    }
}

impl MockModelClient {
    const TOKEN_DELAY_MS: u64 = 30;
}

#[async_trait]
impl ModelClient for MockModelClient {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ProviderError> {
        let scripted = lock_unpoisoned(&self.script).next_round();
        let events = match scripted {
            Some(events) => events,
            None => echo_round(&request),
        };
        lock_unpoisoned(&self.requests).push(request);

        let delay = self.event_delay;
        let stream = stream::iter(events).then(move |event| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            event
        });

        Ok(stream.boxed())
    }
}

/// Splits `text` into word-sized incremental deltas followed by `Finish`.
#[must_use]
pub fn text_round(text: &str, usage: TokenUsage) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = split_tokens(text)
        .into_iter()
        .map(StreamEvent::text)
        .collect();
    events.push(StreamEvent::finish(text, usage));
    events
}

/// A round that requests `calls` after an optional lead-in text.
#[must_use]
pub fn tool_round(text: &str, calls: Vec<ToolCall>, usage: TokenUsage) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = split_tokens(text)
        .into_iter()
        .map(StreamEvent::text)
        .collect();
    events.extend(calls.into_iter().map(StreamEvent::ToolCall));
    events.push(StreamEvent::finish(text, usage));
    events
}

/// Builds a tool call from a JSON object literal; non-object values become empty input.
#[must_use]
pub fn tool_call(id: &str, name: &str, input: serde_json::Value) -> ToolCall {
    let input: ToolInput = match input {
        serde_json::Value::Object(map) => map,
        _ => ToolInput::new(),
    };
    ToolCall::new(id, name, input)
}

fn echo_round(request: &ModelRequest) -> Vec<StreamEvent> {
    let prompt = request
        .messages
        .iter()
        .rev()
        .find_map(|message| match message {
            ModelMessage::User { content } => Some(content.as_str()),
            _ => None,
        })
        .unwrap_or("");

    let reply = format!("Mock response to: {}", prompt.trim());
    let usage = TokenUsage::new(
        word_count(prompt) + word_count(&request.system_prompt),
        word_count(&reply),
    );
    text_round(&reply, usage)
}

fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    for ch in text.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
