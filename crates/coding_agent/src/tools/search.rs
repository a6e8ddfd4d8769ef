use std::fs;
use std::path::{Path, PathBuf};

use agent_provider::ToolInput;
use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use regex::Regex;

use super::{optional_str, required_str, run_blocking, Workspace, NO_MATCHES, SEARCH_MAX_RESULTS};
use crate::registry::{ParameterKind, Tool, ToolDefinition, ToolExecutor, ToolOutcome, ToolParameter};

pub struct GlobTool {
    workspace: Workspace,
}

impl GlobTool {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "glob".to_string(),
            description: "Find files matching a glob pattern".to_string(),
            parameters: vec![
                ToolParameter::required(
                    "pattern",
                    ParameterKind::String,
                    "Glob pattern (e.g. **/*.rs)",
                ),
                ToolParameter::optional(
                    "cwd",
                    ParameterKind::String,
                    "Directory to search in (default: workspace root)",
                ),
            ],
            requires_permission: false,
        }
    }

    #[must_use]
    pub fn into_tool(self) -> Tool {
        Tool::new(Self::definition(), self)
    }
}

#[async_trait]
impl ToolExecutor for GlobTool {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome {
        let pattern = match required_str(input, "pattern") {
            Ok(pattern) => pattern.to_string(),
            Err(outcome) => return outcome,
        };
        let cwd = optional_str(input, "cwd").unwrap_or(".").to_string();
        let workspace = self.workspace.clone();
        run_blocking(move || glob_files(&workspace, &pattern, &cwd)).await
    }
}

fn glob_files(workspace: &Workspace, pattern: &str, cwd: &str) -> ToolOutcome {
    let matcher = match compile_glob(pattern) {
        Ok(matcher) => matcher,
        Err(outcome) => return outcome,
    };
    let base = match resolve_dir(workspace, cwd) {
        Ok(base) => base,
        Err(outcome) => return outcome,
    };

    let mut matches: Vec<String> = walk_files(&base)
        .filter(|path| {
            path.strip_prefix(&base)
                .is_ok_and(|relative| matcher.is_match(relative))
        })
        .map(|path| workspace.display(&path))
        .collect();
    matches.sort();
    matches.truncate(SEARCH_MAX_RESULTS);

    ToolOutcome::ok(render_lines(matches))
}

pub struct GrepTool {
    workspace: Workspace,
}

impl GrepTool {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "grep".to_string(),
            description: "Search file contents for a regex pattern, honoring .gitignore"
                .to_string(),
            parameters: vec![
                ToolParameter::required(
                    "pattern",
                    ParameterKind::String,
                    "Regex pattern to search for",
                ),
                ToolParameter::optional(
                    "path",
                    ParameterKind::String,
                    "File or directory to search (default: workspace root)",
                ),
                ToolParameter::optional(
                    "glob",
                    ParameterKind::String,
                    "File glob filter (e.g. *.rs)",
                ),
            ],
            requires_permission: false,
        }
    }

    #[must_use]
    pub fn into_tool(self) -> Tool {
        Tool::new(Self::definition(), self)
    }
}

#[async_trait]
impl ToolExecutor for GrepTool {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome {
        let pattern = match required_str(input, "pattern") {
            Ok(pattern) => pattern.to_string(),
            Err(outcome) => return outcome,
        };
        let path = optional_str(input, "path").unwrap_or(".").to_string();
        let file_glob = optional_str(input, "glob").map(str::to_string);
        let workspace = self.workspace.clone();
        run_blocking(move || grep_files(&workspace, &pattern, &path, file_glob.as_deref())).await
    }
}

fn grep_files(
    workspace: &Workspace,
    pattern: &str,
    path: &str,
    file_glob: Option<&str>,
) -> ToolOutcome {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => return ToolOutcome::fail(format!("Invalid regex: {error}")),
    };
    let filter = match file_glob.map(compile_glob).transpose() {
        Ok(filter) => filter,
        Err(outcome) => return outcome,
    };
    let base = match workspace.resolve(path) {
        Ok(base) if base.exists() => base,
        Ok(_) => return ToolOutcome::fail(format!("Path not found: {path}")),
        Err(error) => return ToolOutcome::fail(error),
    };

    let mut lines = Vec::new();
    'files: for file in walk_files(&base) {
        if let Some(filter) = &filter {
            if !glob_filter_matches(filter, &base, &file) {
                continue;
            }
        }

        // Binary and non-UTF-8 files are skipped.
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        let display = workspace.display(&file);
        for (index, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                lines.push(format!("{display}:{}:{line}", index + 1));
                if lines.len() >= SEARCH_MAX_RESULTS {
                    break 'files;
                }
            }
        }
    }

    ToolOutcome::ok(render_lines(lines))
}

fn glob_filter_matches(filter: &GlobMatcher, base: &Path, file: &Path) -> bool {
    let by_name = file
        .file_name()
        .is_some_and(|name| filter.is_match(Path::new(name)));
    let by_relative = file
        .strip_prefix(base)
        .is_ok_and(|relative| filter.is_match(relative));
    by_name || by_relative
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, ToolOutcome> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|error| ToolOutcome::fail(format!("Invalid glob pattern: {error}")))
}

fn resolve_dir(workspace: &Workspace, dir: &str) -> Result<PathBuf, ToolOutcome> {
    let resolved = workspace.resolve(dir).map_err(ToolOutcome::fail)?;
    if resolved.is_dir() {
        Ok(resolved)
    } else {
        Err(ToolOutcome::fail(format!("Directory not found: {dir}")))
    }
}

/// Files under `base` in file-name order, honoring ignore files.
fn walk_files(base: &Path) -> impl Iterator<Item = PathBuf> {
    WalkBuilder::new(base)
        .sort_by_file_name(|left, right| left.cmp(right))
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
        .map(ignore::DirEntry::into_path)
}

fn render_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        NO_MATCHES.to_string()
    } else {
        lines.join("\n")
    }
}
