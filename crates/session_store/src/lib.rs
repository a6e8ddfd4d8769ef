//! Durable conversation history for the coding agent.
//!
//! Each session is one append-only JSONL file: a header line followed by
//! message and title records. Token totals are recomputed on replay.

mod error;
mod paths;
mod schema;
mod session;
mod store;

pub use error::SessionStoreError;
pub use paths::{session_file_name, session_root};
pub use schema::{SessionHeader, TitleRecord, SESSION_FORMAT_VERSION};
pub use session::{Session, SessionSummary, DEFAULT_SESSION_TITLE};
pub use store::SessionStore;
