//! Caller-side run ownership.
//!
//! The [`ChatController`] owns the session and a [`RunGeneration`] counter.
//! Each submitted run captures a [`RunTicket`]; callbacks from a run whose
//! ticket is no longer current are discarded. Cancellation is advisory: the
//! stale run keeps going until its stream or tool finishes, but nothing it
//! reports reaches the view or the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::{Message, ToolInput};
use async_trait::async_trait;
use session_store::{Session, SessionStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::agent::{Agent, AgentCallbacks};
use crate::error::{AgentError, ChatError};
use crate::streaming::{merge_stream_text, strip_system_reminders};

/// Monotonic run counter shared between a controller and its callbacks.
#[derive(Debug, Clone)]
pub struct RunGeneration {
    counter: Arc<watch::Sender<u64>>,
}

impl Default for RunGeneration {
    fn default() -> Self {
        let (counter, _) = watch::channel(0);
        Self {
            counter: Arc::new(counter),
        }
    }
}

impl RunGeneration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, making every earlier ticket stale.
    #[must_use]
    pub fn begin(&self) -> RunTicket {
        let mut id = 0;
        self.counter.send_modify(|current| {
            *current += 1;
            id = *current;
        });
        RunTicket {
            generation: self.clone(),
            id,
        }
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        *self.counter.borrow()
    }

    /// Advances the counter unconditionally.
    pub fn invalidate(&self) {
        self.counter.send_modify(|current| *current += 1);
    }
}

#[derive(Debug, Clone)]
pub struct RunTicket {
    generation: RunGeneration,
    id: u64,
}

impl RunTicket {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generation.current() == self.id
    }

    /// Retires this ticket. Returns false when it was already stale.
    pub fn finish(&self) -> bool {
        self.generation.counter.send_if_modified(|current| {
            if *current == self.id {
                *current += 1;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once this ticket is no longer current.
    pub async fn stale(&self) {
        let mut changes = self.generation.counter.subscribe();
        // The sender lives in `self`, so this only returns once the id moves.
        let _ = changes.wait_for(|current| *current != self.id).await;
    }
}

/// Display-layer sink for one chat.
#[async_trait]
pub trait ChatView: Send + Sync {
    /// Reconciled assistant text streamed so far in the current run.
    fn stream_text(&self, full: &str);
    fn tool_call(&self, name: &str, input: &ToolInput);
    fn tool_result(&self, name: &str, output: &str);
    /// A message was appended to the session.
    fn message_committed(&self, message: &Message);
    async fn confirm_tool(&self, name: &str, input: &ToolInput) -> bool;
}

/// [`AgentCallbacks`] that only act while their ticket is current.
pub struct GuardedCallbacks {
    ticket: RunTicket,
    done: AtomicBool,
    streaming: Mutex<String>,
    view: Arc<dyn ChatView>,
    store: Arc<SessionStore>,
    session: Arc<Mutex<Session>>,
}

impl GuardedCallbacks {
    #[must_use]
    pub fn new(
        ticket: RunTicket,
        view: Arc<dyn ChatView>,
        store: Arc<SessionStore>,
        session: Arc<Mutex<Session>>,
    ) -> Self {
        Self {
            ticket,
            done: AtomicBool::new(false),
            streaming: Mutex::new(String::new()),
            view,
            store,
            session,
        }
    }

    fn is_live(&self) -> bool {
        self.ticket.is_current() && !self.done.load(Ordering::SeqCst)
    }

    /// Claims the single terminal callback for this run.
    fn claim_terminal(&self) -> bool {
        self.ticket.is_current() && !self.done.swap(true, Ordering::SeqCst)
    }

    fn commit(&self, message: Message) {
        {
            let mut session = lock_unpoisoned(&self.session);
            if let Err(error) = self.store.record(&mut session, message.clone()) {
                tracing::warn!(%error, "failed to persist message; keeping it in memory");
                session.push(message.clone());
            }
        }
        lock_unpoisoned(&self.streaming).clear();
        self.view.message_committed(&message);
        self.ticket.finish();
    }
}

#[async_trait]
impl AgentCallbacks for GuardedCallbacks {
    fn on_text_delta(&self, delta: &str) {
        if !self.is_live() {
            return;
        }

        let full = {
            let mut streaming = lock_unpoisoned(&self.streaming);
            *streaming = merge_stream_text(&streaming, delta);
            strip_system_reminders(&streaming)
        };
        self.view.stream_text(&full);
    }

    fn on_tool_call(&self, name: &str, input: &ToolInput) {
        if self.is_live() {
            self.view.tool_call(name, input);
        }
    }

    fn on_tool_result(&self, name: &str, output: &str) {
        if self.is_live() {
            self.view.tool_result(name, output);
        }
    }

    fn on_complete(&self, mut message: Message) {
        if self.claim_terminal() {
            message.content = strip_system_reminders(&message.content);
            self.commit(message);
        } else {
            tracing::debug!(run = self.ticket.id(), "dropping stale completion");
        }
    }

    fn on_error(&self, error: AgentError) {
        if self.claim_terminal() {
            self.commit(Message::assistant(format!("Error: {error}")));
        } else {
            tracing::debug!(run = self.ticket.id(), %error, "dropping stale error");
        }
    }

    async fn on_permission_request(&self, name: &str, input: &ToolInput) -> bool {
        if !self.is_live() {
            return false;
        }

        // A prompt left open by a cancelled run must not keep reading input.
        tokio::select! {
            approved = self.view.confirm_tool(name, input) => approved && self.is_live(),
            () = self.ticket.stale() => {
                tracing::debug!(run = self.ticket.id(), tool = %name, "abandoning stale confirmation");
                false
            }
        }
    }
}

/// Owns one chat session and serializes runs against it.
pub struct ChatController {
    agent: Arc<Agent>,
    store: Arc<SessionStore>,
    session: Arc<Mutex<Session>>,
    generation: RunGeneration,
    active: Mutex<Option<RunTicket>>,
}

impl ChatController {
    #[must_use]
    pub fn new(agent: Arc<Agent>, store: Arc<SessionStore>, session: Session) -> Self {
        Self {
            agent,
            store,
            session: Arc::new(Mutex::new(session)),
            generation: RunGeneration::new(),
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn session(&self) -> Session {
        lock_unpoisoned(&self.session).clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock_unpoisoned(&self.active)
            .as_ref()
            .is_some_and(RunTicket::is_current)
    }

    /// Records the user message and starts a run on the tokio runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, text: &str, view: Arc<dyn ChatView>) -> Result<JoinHandle<()>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let mut active = lock_unpoisoned(&self.active);
        if active.as_ref().is_some_and(RunTicket::is_current) {
            return Err(ChatError::RunActive);
        }

        let user_message = Message::user(text);
        let messages = {
            let mut session = lock_unpoisoned(&self.session);
            self.store.record(&mut session, user_message.clone())?;
            session.messages.clone()
        };
        view.message_committed(&user_message);

        let ticket = self.generation.begin();
        *active = Some(ticket.clone());
        tracing::debug!(run = ticket.id(), "submitting run");

        let callbacks = GuardedCallbacks::new(
            ticket,
            view,
            Arc::clone(&self.store),
            Arc::clone(&self.session),
        );
        let agent = Arc::clone(&self.agent);

        Ok(tokio::spawn(async move {
            agent.run(&messages, &callbacks).await;
        }))
    }

    /// Makes the active run stale. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let active = lock_unpoisoned(&self.active);
        match active.as_ref() {
            Some(ticket) if ticket.is_current() => {
                self.generation.invalidate();
                tracing::info!(run = ticket.id(), "run cancelled");
                true
            }
            _ => false,
        }
    }

    /// Records a display-only system message.
    pub fn note(&self, text: &str) -> Result<Message, ChatError> {
        let message = Message::system(text);
        let mut session = lock_unpoisoned(&self.session);
        self.store.record(&mut session, message.clone())?;
        Ok(message)
    }

    /// Drops any active run and switches to a fresh session.
    pub fn reset_session(&self, title: Option<&str>) -> Result<Session, ChatError> {
        self.generation.invalidate();
        let session = self.store.create(title)?;
        *lock_unpoisoned(&self.session) = session.clone();
        Ok(session)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_makes_earlier_tickets_stale() {
        let generation = RunGeneration::new();
        let first = generation.begin();
        assert!(first.is_current());

        let second = generation.begin();
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[test]
    fn finish_only_advances_current_ticket() {
        let generation = RunGeneration::new();
        let stale = generation.begin();
        let live = generation.begin();

        assert!(!stale.finish());
        assert!(live.is_current());
        assert!(live.finish());
        assert!(!live.is_current());
        assert!(!live.finish());
    }

    #[test]
    fn invalidate_retires_live_ticket() {
        let generation = RunGeneration::new();
        let ticket = generation.begin();

        generation.invalidate();

        assert!(!ticket.is_current());
    }
}
