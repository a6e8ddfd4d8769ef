//! Built-in workspace tools.
//!
//! Every path argument resolves against the workspace root. Absolute paths
//! are accepted only when they land inside it.

use std::path::{Component, Path, PathBuf};

use agent_provider::ToolInput;
use serde_json::Value;

use crate::registry::{ToolOutcome, ToolRegistry};

mod bash;
mod files;
mod search;

pub use bash::BashTool;
pub use files::{EditTool, ReadTool, WriteTool};
pub use search::{GlobTool, GrepTool};

pub const DEFAULT_BASH_TIMEOUT_MS: u64 = 30_000;
pub const BASH_MAX_OUTPUT_BYTES: usize = 100 * 1024;
pub const READ_MAX_BYTES: usize = 200 * 1024;
pub const SEARCH_MAX_RESULTS: usize = 500;

pub const NO_MATCHES: &str = "(no matches)";

/// Canonical workspace root that confines every tool path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        let canonical_root = root
            .canonicalize()
            .map_err(|err| format!("Failed to resolve workspace root: {err}"))?;

        if !canonical_root.is_dir() {
            return Err("Workspace root must be a directory".to_string());
        }

        Ok(Self {
            root: canonical_root,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` to an absolute location inside the workspace. The
    /// target itself does not need to exist.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("Path must not be empty".to_string());
        }

        let candidate = self.absolute_candidate(path);
        let (anchor, rest) = split_existing_ancestor(&candidate)?;
        let anchor = anchor
            .canonicalize()
            .map_err(|error| format!("Failed to resolve path {}: {error}", anchor.display()))?;

        if rest
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(format!("Path escapes workspace root: {path}"));
        }

        let resolved = anchor.join(rest);
        self.ensure_inside_workspace(&resolved, path)?;
        Ok(resolved)
    }

    /// Path relative to the root for display, falling back to the full path.
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|relative| relative.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    fn absolute_candidate(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn ensure_inside_workspace(&self, resolved: &Path, requested: &str) -> Result<(), String> {
        if resolved.starts_with(&self.root) {
            Ok(())
        } else {
            Err(format!("Path escapes workspace root: {requested}"))
        }
    }
}

/// Splits `path` into its deepest existing ancestor and the remainder.
fn split_existing_ancestor(path: &Path) -> Result<(PathBuf, PathBuf), String> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            let rest = path
                .strip_prefix(ancestor)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Ok((ancestor.to_path_buf(), rest));
        }
    }

    Err(format!(
        "No existing ancestor found for path {}",
        path.display()
    ))
}

/// Settings shared by the built-in tools.
#[derive(Debug, Clone)]
pub struct BuiltinTools {
    pub workspace: Workspace,
    pub bash_timeout_ms: u64,
}

impl BuiltinTools {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            bash_timeout_ms: DEFAULT_BASH_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn with_bash_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.bash_timeout_ms = timeout_ms;
        self
    }
}

/// Registers bash, read, write, edit, glob, and grep.
pub fn register_builtin_tools(registry: &mut ToolRegistry, tools: BuiltinTools) {
    let workspace = tools.workspace;
    registry.register(BashTool::new(workspace.clone(), tools.bash_timeout_ms).into_tool());
    registry.register(ReadTool::new(workspace.clone()).into_tool());
    registry.register(WriteTool::new(workspace.clone()).into_tool());
    registry.register(EditTool::new(workspace.clone()).into_tool());
    registry.register(GlobTool::new(workspace.clone()).into_tool());
    registry.register(GrepTool::new(workspace).into_tool());
}

pub(crate) fn required_str<'a>(input: &'a ToolInput, name: &str) -> Result<&'a str, ToolOutcome> {
    input
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolOutcome::fail(format!("Missing required parameter: {name}")))
}

pub(crate) fn optional_str<'a>(input: &'a ToolInput, name: &str) -> Option<&'a str> {
    input
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

/// Runs blocking tool work off the async executor.
pub(crate) async fn run_blocking<F>(work: F) -> ToolOutcome
where
    F: FnOnce() -> ToolOutcome + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(outcome) => outcome,
        Err(error) => ToolOutcome::fail(format!("Tool task failed: {error}")),
    }
}

pub(crate) fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn resolve_accepts_missing_paths_inside_root() {
        let dir = tempdir().expect("tempdir");
        let workspace = Workspace::new(dir.path()).expect("workspace");

        let resolved = workspace.resolve("new/dir/file.txt").expect("inside root");

        assert_eq!(resolved, workspace.root().join("new/dir/file.txt"));
        assert_eq!(workspace.display(&resolved), "new/dir/file.txt");
    }

    #[test]
    fn resolve_rejects_escapes() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("inner")).expect("inner dir");
        let workspace = Workspace::new(dir.path().join("inner")).expect("workspace");

        for path in ["../outside.txt", "missing/../../x", "/etc/passwd"] {
            let error = workspace.resolve(path).expect_err("escape must fail");
            assert!(error.contains("Path escapes workspace root"), "{path}: {error}");
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(10);

        let truncated = truncate_to_byte_limit(text, 5);

        assert_eq!(truncated, "éé\n[truncated]");
    }
}
