//! Reconciliation of streamed text chunks.
//!
//! Providers disagree on whether a text event carries an increment or the
//! cumulative text so far, and some repeat trailing context. The merge below
//! folds any of those shapes into one buffer without duplicating text.

use std::sync::OnceLock;

use regex::Regex;

/// Longest suffix/prefix overlap considered, in characters.
pub const MAX_OVERLAP_CHARS: usize = 4096;

/// Merges `chunk` into `accumulated` and returns the new buffer.
///
/// Rules apply in order: empty inputs, identical resend, cumulative
/// extension, re-sent prefix, re-sent suffix, whitespace-led variants of the
/// previous three, then a bounded suffix/prefix overlap scan. Anything else is
/// appended verbatim. The result is never shorter than `accumulated`.
#[must_use]
pub fn merge_stream_text(accumulated: &str, chunk: &str) -> String {
    if chunk.is_empty() {
        return accumulated.to_string();
    }
    if accumulated.is_empty() {
        return chunk.to_string();
    }
    if chunk == accumulated {
        return accumulated.to_string();
    }

    if chunk.starts_with(accumulated) {
        return chunk.to_string();
    }
    if accumulated.starts_with(chunk) || accumulated.ends_with(chunk) {
        return accumulated.to_string();
    }

    let rest = chunk.trim_start();
    let leading = &chunk[..chunk.len() - rest.len()];
    if !leading.is_empty() {
        if rest == accumulated || accumulated.ends_with(rest) {
            return format!("{accumulated}{leading}");
        }
        if let Some(novel) = rest.strip_prefix(accumulated) {
            return format!("{accumulated}{leading}{novel}");
        }
    }

    if let Some(overlap) = overlap_len(accumulated, chunk) {
        return format!("{accumulated}{}", &chunk[overlap..]);
    }

    format!("{accumulated}{chunk}")
}

/// Byte length of the longest prefix of `chunk` that `accumulated` ends with.
fn overlap_len(accumulated: &str, chunk: &str) -> Option<usize> {
    let max_chars = accumulated
        .chars()
        .rev()
        .take(MAX_OVERLAP_CHARS)
        .count()
        .min(chunk.chars().count());

    // boundaries[k] is the byte offset just past the k-th character.
    let boundaries: Vec<usize> = chunk
        .char_indices()
        .map(|(offset, _)| offset)
        .skip(1)
        .chain(std::iter::once(chunk.len()))
        .take(max_chars)
        .collect();

    boundaries
        .iter()
        .rev()
        .copied()
        .find(|&end| accumulated.ends_with(&chunk[..end]))
}

fn system_reminder_regex() -> Option<&'static Regex> {
    static CACHED: OnceLock<Option<Regex>> = OnceLock::new();
    CACHED
        .get_or_init(|| Regex::new(r"(?s)<system-reminder>.*?</system-reminder>").ok())
        .as_ref()
}

/// Removes every closed `<system-reminder>` block from assistant text.
#[must_use]
pub fn strip_system_reminders(text: &str) -> String {
    match system_reminder_regex() {
        Some(regex) if text.contains("<system-reminder>") => {
            regex.replace_all(text, "").into_owned()
        }
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminders_are_removed_lazily_across_lines() {
        let text = "Before <system-reminder>one\ntwo</system-reminder>middle\
                    <system-reminder>three</system-reminder> after";

        assert_eq!(strip_system_reminders(text), "Before middle after");
    }

    #[test]
    fn unclosed_reminder_is_left_alone() {
        assert_eq!(
            strip_system_reminders("partial <system-reminder>still stream"),
            "partial <system-reminder>still stream"
        );
        assert_eq!(strip_system_reminders("plain"), "plain");
    }

    #[test]
    fn empty_inputs_short_circuit() {
        assert_eq!(merge_stream_text("abc", ""), "abc");
        assert_eq!(merge_stream_text("", "abc"), "abc");
        assert_eq!(merge_stream_text("", ""), "");
    }

    #[test]
    fn identical_resend_is_idempotent() {
        assert_eq!(merge_stream_text("Hello", "Hello"), "Hello");
    }

    #[test]
    fn cumulative_chunk_replaces_buffer() {
        assert_eq!(merge_stream_text("Hello", "Hello, world"), "Hello, world");
    }

    #[test]
    fn resent_prefix_and_suffix_are_ignored() {
        assert_eq!(merge_stream_text("Hello, world", "Hello"), "Hello, world");
        assert_eq!(merge_stream_text("Hello, world", "world"), "Hello, world");
    }

    #[test]
    fn overlap_scan_drops_repeated_context() {
        assert_eq!(merge_stream_text("foo", "foobar"), "foobar");
        assert_eq!(merge_stream_text("foobar", "bar"), "foobar");
        assert_eq!(merge_stream_text("the quick", "quick brown"), "the quick brown");
    }

    #[test]
    fn plain_increments_concatenate() {
        assert_eq!(merge_stream_text("Hello", " there"), "Hello there");
        assert_eq!(merge_stream_text("abc", "xyz"), "abcxyz");
    }

    #[test]
    fn whitespace_led_resends_keep_only_novel_text() {
        assert_eq!(merge_stream_text("Hello", " Hello"), "Hello ");
        assert_eq!(merge_stream_text("Hello", "\nHello world"), "Hello\n world");
        assert_eq!(merge_stream_text("say hi", "  hi"), "say hi  ");
    }

    #[test]
    fn overlap_respects_multibyte_boundaries() {
        assert_eq!(merge_stream_text("naïve café", "café au lait"), "naïve café au lait");
        assert_eq!(merge_stream_text("日本語", "語です"), "日本語です");
    }

    #[test]
    fn overlap_scan_stops_at_bound() {
        let shared = "x".repeat(MAX_OVERLAP_CHARS + 10);
        let accumulated = format!("a{shared}");
        let chunk = format!("{shared}b");

        let merged = merge_stream_text(&accumulated, &chunk);

        assert_eq!(merged, format!("{accumulated}{}b", "x".repeat(10)));
    }

    #[test]
    fn merge_never_shrinks_buffer() {
        let samples = [
            "", "a", "ab", "abc", " a", "b c", "cab", "Hello", "lo, w", "😀x", "x😀",
        ];
        for accumulated in samples {
            for chunk in samples {
                let merged = merge_stream_text(accumulated, chunk);
                assert!(
                    merged.len() >= accumulated.len(),
                    "merge({accumulated:?}, {chunk:?}) = {merged:?}"
                );
            }
        }
    }
}
