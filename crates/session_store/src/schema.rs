use agent_provider::Message;
use serde::{Deserialize, Serialize};

pub const SESSION_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    pub version: u32,
    pub session_id: String,
    pub title: String,
    pub created_at: String,
}

impl SessionHeader {
    #[must_use]
    pub fn v1(
        session_id: impl Into<String>,
        title: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            version: SESSION_FORMAT_VERSION,
            session_id: session_id.into(),
            title: title.into(),
            created_at: created_at.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TitleRecord {
    pub title: String,
    pub ts: String,
}

/// One JSONL line. Line 1 is always `Session`; the rest are `Message` or `Title`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum SessionRecord {
    Session(SessionHeader),
    Message(Message),
    Title(TitleRecord),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum SessionRecordRef<'a> {
    Session(&'a SessionHeader),
    Message(&'a Message),
    Title(&'a TitleRecord),
}
