#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_provider::{Message, ModelClient, ToolInput};
use async_trait::async_trait;
use coding_agent::agent::{Agent, AgentCallbacks, AgentSettings};
use coding_agent::error::AgentError;
use coding_agent::permission::{PermissionChecker, PermissionConfig};
use coding_agent::registry::{
    ParameterKind, Tool, ToolDefinition, ToolExecutor, ToolOutcome, ToolParameter, ToolRegistry,
};
use coding_agent::runtime::ChatView;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TextDelta(String),
    ToolCall(String),
    ToolResult { name: String, output: String },
    PermissionRequest(String),
    Complete(Message),
    Error(AgentError),
}

/// Records every callback in arrival order and answers permission
/// requests with a fixed decision.
pub struct RecordingCallbacks {
    events: Mutex<Vec<Event>>,
    approve: bool,
}

impl RecordingCallbacks {
    pub fn approving() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            approve: true,
        }
    }

    pub fn denying() -> Self {
        Self {
            approve: false,
            ..Self::approving()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    pub fn completions(&self) -> Vec<Message> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Complete(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<AgentError> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn tool_results(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::ToolResult { name, output } => Some((name, output)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matcher: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| matcher(event)).count()
    }

    fn push(&self, event: Event) {
        lock(&self.events).push(event);
    }
}

#[async_trait]
impl AgentCallbacks for RecordingCallbacks {
    fn on_text_delta(&self, delta: &str) {
        self.push(Event::TextDelta(delta.to_string()));
    }

    fn on_tool_call(&self, name: &str, _input: &ToolInput) {
        self.push(Event::ToolCall(name.to_string()));
    }

    fn on_tool_result(&self, name: &str, output: &str) {
        self.push(Event::ToolResult {
            name: name.to_string(),
            output: output.to_string(),
        });
    }

    fn on_complete(&self, message: Message) {
        self.push(Event::Complete(message));
    }

    fn on_error(&self, error: AgentError) {
        self.push(Event::Error(error));
    }

    async fn on_permission_request(&self, name: &str, _input: &ToolInput) -> bool {
        self.push(Event::PermissionRequest(name.to_string()));
        self.approve
    }
}

/// Executor that counts invocations and returns a fixed outcome.
#[derive(Clone)]
pub struct SpyExecutor {
    calls: Arc<AtomicUsize>,
    outcome: ToolOutcome,
}

impl SpyExecutor {
    pub fn new(outcome: ToolOutcome) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            outcome,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for SpyExecutor {
    async fn execute(&self, _input: &ToolInput) -> ToolOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub fn spy_tool(name: &str, requires_permission: bool, spy: &SpyExecutor) -> Tool {
    Tool::new(
        ToolDefinition {
            name: name.to_string(),
            description: format!("{name} test tool"),
            parameters: vec![ToolParameter::optional(
                "arg",
                ParameterKind::String,
                "anything",
            )],
            requires_permission,
        },
        spy.clone(),
    )
}

pub fn agent_with(
    client: Arc<dyn ModelClient>,
    registry: ToolRegistry,
    auto_approve: &[&str],
    max_rounds: u32,
) -> Agent {
    let permissions = PermissionChecker::new(PermissionConfig {
        auto_approve: auto_approve.iter().map(|name| name.to_string()).collect(),
        ..PermissionConfig::default()
    });
    let settings = AgentSettings {
        max_rounds,
        ..AgentSettings::default()
    };
    Agent::new(client, Arc::new(registry), permissions, settings)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Stream(String),
    ToolCall(String),
    ToolResult(String),
    Committed(Message),
    Confirm(String),
}

/// `ChatView` that records what it was shown.
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    approve: bool,
    confirm_delay: Option<Duration>,
}

impl RecordingView {
    pub fn new(approve: bool) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            approve,
            confirm_delay: None,
        }
    }

    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        lock(&self.events).clone()
    }

    pub fn committed(&self) -> Vec<Message> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Committed(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn last_stream(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            ViewEvent::Stream(text) => Some(text),
            _ => None,
        })
    }

    fn push(&self, event: ViewEvent) {
        lock(&self.events).push(event);
    }
}

#[async_trait]
impl ChatView for RecordingView {
    fn stream_text(&self, full: &str) {
        self.push(ViewEvent::Stream(full.to_string()));
    }

    fn tool_call(&self, name: &str, _input: &ToolInput) {
        self.push(ViewEvent::ToolCall(name.to_string()));
    }

    fn tool_result(&self, name: &str, _output: &str) {
        self.push(ViewEvent::ToolResult(name.to_string()));
    }

    fn message_committed(&self, message: &Message) {
        self.push(ViewEvent::Committed(message.clone()));
    }

    async fn confirm_tool(&self, name: &str, _input: &ToolInput) -> bool {
        self.push(ViewEvent::Confirm(name.to_string()));
        if let Some(delay) = self.confirm_delay {
            tokio::time::sleep(delay).await;
        }
        self.approve
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
