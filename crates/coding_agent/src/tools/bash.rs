use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use agent_provider::ToolInput;
use async_trait::async_trait;
use serde_json::Value;
use wait_timeout::ChildExt;

use super::{required_str, run_blocking, truncate_to_byte_limit, Workspace, BASH_MAX_OUTPUT_BYTES};
use crate::registry::{ParameterKind, Tool, ToolDefinition, ToolExecutor, ToolOutcome, ToolParameter};

pub struct BashTool {
    workspace: Workspace,
    default_timeout_ms: u64,
}

impl BashTool {
    #[must_use]
    pub fn new(workspace: Workspace, default_timeout_ms: u64) -> Self {
        Self {
            workspace,
            default_timeout_ms,
        }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "bash".to_string(),
            description: "Execute a shell command in the workspace and return stdout/stderr"
                .to_string(),
            parameters: vec![
                ToolParameter::required(
                    "command",
                    ParameterKind::String,
                    "The shell command to execute",
                ),
                ToolParameter::optional(
                    "timeout",
                    ParameterKind::Number,
                    "Timeout in milliseconds (default: 30000)",
                ),
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
impl ToolExecutor for BashTool {
    async fn execute(&self, input: &ToolInput) -> ToolOutcome {
        let command = match required_str(input, "command") {
            Ok(command) => command.to_string(),
            Err(outcome) => return outcome,
        };
        let timeout_ms = input
            .get("timeout")
            .and_then(timeout_millis)
            .unwrap_or(self.default_timeout_ms);
        let cwd = self.workspace.root().to_path_buf();

        tracing::debug!(%command, timeout_ms, "running bash");
        run_blocking(move || run_command(&command, &cwd, timeout_ms)).await
    }
}

fn timeout_millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|millis| millis.is_finite() && *millis > 0.0)
            .map(|millis| millis as u64)
    })
}

fn run_command(command: &str, cwd: &std::path::Path, timeout_ms: u64) -> ToolOutcome {
    let mut shell = Command::new("bash");
    shell
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        shell.process_group(0);
    }

    let mut child = match shell.spawn() {
        Ok(child) => child,
        Err(error) => return ToolOutcome::fail(format!("Failed to launch bash command: {error}")),
    };

    let stdout = drain_pipe(child.stdout.take());
    let stderr = drain_pipe(child.stderr.take());

    let status = match child.wait_timeout(Duration::from_millis(timeout_ms)) {
        Ok(Some(status)) => Some(status),
        Ok(None) => {
            kill_process_group(&mut child);
            let _ = child.wait();
            None
        }
        Err(error) => {
            kill_process_group(&mut child);
            let _ = child.wait();
            return ToolOutcome::fail(format!("Failed waiting for bash command: {error}"));
        }
    };
    // Leftover background jobs would hold the pipes open.
    if status.is_some() {
        kill_process_group(&mut child);
    }

    let output = join_output(&collect(stdout), &collect(stderr));
    let output = truncate_to_byte_limit(output, BASH_MAX_OUTPUT_BYTES);

    match status {
        None => ToolOutcome {
            success: false,
            output,
            error: Some(format!("Command timed out after {timeout_ms}ms")),
        },
        Some(status) if status.success() => ToolOutcome::ok(output),
        Some(status) => ToolOutcome {
            success: false,
            output,
            error: Some(match status.code() {
                Some(code) => format!("Exit code: {code}"),
                None => "Exit code: terminated by signal".to_string(),
            }),
        },
    }
}

/// Kills the shell and everything it spawned. The shell leads its own group.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result == -1 {
        let error = std::io::Error::last_os_error();
        if error.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(%error, pgid, "failed to kill bash process group");
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

fn drain_pipe(pipe: Option<impl Read + Send + 'static>) -> Option<thread::JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    }))
}

fn collect(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn join_output(stdout: &str, stderr: &str) -> String {
    let joined = [stdout.trim(), stderr.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if joined.is_empty() {
        "(no output)".to_string()
    } else {
        joined
    }
}
