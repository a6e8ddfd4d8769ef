use std::fs;

use agent_provider::ToolInput;
use async_trait::async_trait;

use super::{required_str, run_blocking, Workspace, READ_MAX_BYTES};
use crate::registry::{ParameterKind, Tool, ToolDefinition, ToolExecutor, ToolOutcome, ToolParameter};

fn path_parameter() -> ToolParameter {
    ToolParameter::required(
        "path",
        ParameterKind::String,
        "File path, relative to the workspace root",
    )
}

pub struct ReadTool {
    workspace: Workspace,
}

impl ReadTool {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "read".to_string(),
            description: "Read the contents of a UTF-8 text file".to_string(),
            parameters: vec![path_parameter()],
            requires_permission: false,
        }
    }

    #[must_use]
    pub fn into_tool(self) -> Tool {
        Tool::new(Self::definition(), self)
    }
}

#[async_trait]
impl ToolExecutor for ReadTool {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome {
        let path = match required_str(input, "path") {
            Ok(path) => path.to_string(),
            Err(outcome) => return outcome,
        };
        let workspace = self.workspace.clone();
        run_blocking(move || read_file(&workspace, &path)).await
    }
}

fn read_file(workspace: &Workspace, path: &str) -> ToolOutcome {
    let resolved = match workspace.resolve(path) {
        Ok(resolved) => resolved,
        Err(error) => return ToolOutcome::fail(error),
    };
    if !resolved.is_file() {
        return ToolOutcome::fail(format!("File not found: {path}"));
    }

    let bytes = match fs::read(&resolved) {
        Ok(bytes) => bytes,
        Err(error) => return ToolOutcome::fail(format!("Failed to read file {path}: {error}")),
    };

    if bytes.len() > READ_MAX_BYTES {
        return ToolOutcome::fail(format!(
            "File exceeds max read size ({} bytes > {READ_MAX_BYTES} bytes)",
            bytes.len()
        ));
    }

    match String::from_utf8(bytes) {
        Ok(content) => ToolOutcome::ok(content),
        Err(_) => ToolOutcome::fail("File is not valid UTF-8 text"),
    }
}

pub struct WriteTool {
    workspace: Workspace,
}

impl WriteTool {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "write".to_string(),
            description: "Write content to a file, creating parent directories as needed"
                .to_string(),
            parameters: vec![
                path_parameter(),
                ToolParameter::required("content", ParameterKind::String, "Full file content"),
            ],
            requires_permission: true,
        }
    }

    #[must_use]
    pub fn into_tool(self) -> Tool {
        Tool::new(Self::definition(), self)
    }
}

#[async_trait]
impl ToolExecutor for WriteTool {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome {
        let (path, content) = match (required_str(input, "path"), required_str(input, "content")) {
            (Ok(path), Ok(content)) => (path.to_string(), content.to_string()),
            (Err(outcome), _) | (_, Err(outcome)) => return outcome,
        };
        let workspace = self.workspace.clone();
        run_blocking(move || write_file(&workspace, &path, &content)).await
    }
}

fn write_file(workspace: &Workspace, path: &str, content: &str) -> ToolOutcome {
    let resolved = match workspace.resolve(path) {
        Ok(resolved) => resolved,
        Err(error) => return ToolOutcome::fail(error),
    };

    if let Some(parent) = resolved.parent() {
        if let Err(error) = fs::create_dir_all(parent) {
            return ToolOutcome::fail(format!(
                "Failed to create parent directories {}: {error}",
                workspace.display(parent)
            ));
        }
    }

    match fs::write(&resolved, content) {
        Ok(()) => ToolOutcome::ok(format!("Written to {path}")),
        Err(error) => ToolOutcome::fail(format!("Failed to write file {path}: {error}")),
    }
}

pub struct EditTool {
    workspace: Workspace,
}

impl EditTool {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "edit".to_string(),
            description: "Replace one unique occurrence of old_string with new_string in a file"
                .to_string(),
            parameters: vec![
                path_parameter(),
                ToolParameter::required(
                    "old_string",
                    ParameterKind::String,
                    "Exact text to replace; must occur exactly once",
                ),
                ToolParameter::required("new_string", ParameterKind::String, "Replacement text"),
            ],
            requires_permission: true,
        }
    }

    #[must_use]
    pub fn into_tool(self) -> Tool {
        Tool::new(Self::definition(), self)
    }
}

#[async_trait]
impl ToolExecutor for EditTool {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome {
        let params = (
            required_str(input, "path"),
            required_str(input, "old_string"),
            required_str(input, "new_string"),
        );
        let (path, old_string, new_string) = match params {
            (Ok(path), Ok(old), Ok(new)) => (path.to_string(), old.to_string(), new.to_string()),
            (Err(outcome), _, _) | (_, Err(outcome), _) | (_, _, Err(outcome)) => return outcome,
        };
        let workspace = self.workspace.clone();
        run_blocking(move || edit_file(&workspace, &path, &old_string, &new_string)).await
    }
}

fn edit_file(workspace: &Workspace, path: &str, old_string: &str, new_string: &str) -> ToolOutcome {
    if old_string.is_empty() {
        return ToolOutcome::fail("old_string must not be empty");
    }

    let resolved = match workspace.resolve(path) {
        Ok(resolved) => resolved,
        Err(error) => return ToolOutcome::fail(error),
    };
    if !resolved.is_file() {
        return ToolOutcome::fail(format!("File not found: {path}"));
    }

    let current = match fs::read_to_string(&resolved) {
        Ok(current) => current,
        Err(error) => return ToolOutcome::fail(format!("Failed to read file {path}: {error}")),
    };

    match current.matches(old_string).count() {
        0 => return ToolOutcome::fail("old_string not found in file"),
        1 => {}
        count => {
            return ToolOutcome::fail(format!("old_string found {count} times, must be unique"))
        }
    }

    let updated = current.replacen(old_string, new_string, 1);
    match fs::write(&resolved, updated) {
        Ok(()) => ToolOutcome::ok(format!("Edited {path}")),
        Err(error) => ToolOutcome::fail(format!("Failed to write file {path}: {error}")),
    }
}
