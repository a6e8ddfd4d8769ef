use std::path::{Path, PathBuf};

pub const SESSION_DIR: [&str; 2] = ["coding_agent", "sessions"];

#[must_use]
pub fn session_root(base: &Path) -> PathBuf {
    base.join(SESSION_DIR[0]).join(SESSION_DIR[1])
}

#[must_use]
pub fn sanitize_timestamp_for_filename(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' => '-',
            _ => c,
        })
        .collect()
}

#[must_use]
pub fn session_file_name(created_at: &str, session_id: &str) -> String {
    format!(
        "{}_{}.jsonl",
        sanitize_timestamp_for_filename(created_at),
        session_id
    )
}

/// Returns true when `file_name` is the session file for `session_id`.
#[must_use]
pub fn is_session_file_for(file_name: &str, session_id: &str) -> bool {
    file_name
        .strip_suffix(".jsonl")
        .and_then(|stem| stem.split_once('_'))
        .is_some_and(|(_, id)| id == session_id)
}

#[must_use]
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_filesystem_safe_and_matches_its_id() {
        let name = session_file_name("2026-02-14T00:00:00Z", "abc123");

        assert_eq!(name, "2026-02-14T00-00-00Z_abc123.jsonl");
        assert!(is_session_file_for(&name, "abc123"));
        assert!(!is_session_file_for(&name, "abc"));
        assert!(!is_session_file_for("notes.txt", "abc123"));
    }

    #[test]
    fn session_ids_reject_path_characters() {
        assert!(is_valid_session_id("0f3c9a"));
        assert!(is_valid_session_id("with-dash_and_underscore"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../escape"));
        assert!(!is_valid_session_id("a/b"));
    }
}
