use agent_provider::{generate_id, Message};
use time::OffsetDateTime;

pub const DEFAULT_SESSION_TITLE: &str = "New Session";

/// One conversation: an ordered message log plus a running token counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub total_tokens: u64,
}

/// Listing view of a session without its messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub total_tokens: u64,
    pub message_count: usize,
}

impl Session {
    #[must_use]
    pub fn new(title: Option<&str>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self::with_identity(generate_id(), normalize_title(title), now)
    }

    pub(crate) fn with_identity(id: String, title: String, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            title,
            messages: Vec::new(),
            created_at,
            updated_at: created_at,
            total_tokens: 0,
        }
    }

    /// Appends `message` and folds its usage into `total_tokens`.
    ///
    /// `updated_at` only moves forward.
    pub fn push(&mut self, message: Message) {
        self.total_tokens = self.total_tokens.saturating_add(message.token_total());
        self.touch(message.created_at);
        self.messages.push(message);
    }

    pub(crate) fn touch(&mut self, at: OffsetDateTime) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            total_tokens: self.total_tokens,
            message_count: self.messages.len(),
        }
    }
}

pub(crate) fn normalize_title(title: Option<&str>) -> String {
    title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_SESSION_TITLE)
        .to_string()
}
