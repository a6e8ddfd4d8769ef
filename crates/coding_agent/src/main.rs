use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::{Message, Role, ToolInput};
use anyhow::Context;
use async_trait::async_trait;
use coding_agent::agent::{Agent, AgentSettings};
use coding_agent::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use coding_agent::config::{Config, ConfigPaths};
use coding_agent::permission::PermissionChecker;
use coding_agent::prompt::PromptContext;
use coding_agent::registry::ToolRegistry;
use coding_agent::runtime::{ChatController, ChatView};
use coding_agent::tools::{register_builtin_tools, BuiltinTools, Workspace};
use coding_agent::{logging, providers};
use session_store::SessionStore;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type SharedInput = Arc<tokio::sync::Mutex<Lines<BufReader<Stdin>>>>;

const TOOL_RESULT_PREVIEW_LINES: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let paths = ConfigPaths::discover(&cwd);
    let config = Config::load(&paths)?;
    logging::init(&config.log_level);

    let client = providers::provider_for_id(&config.provider, &config.model)?;
    let workspace = Workspace::new(&cwd).map_err(anyhow::Error::msg)?;
    let mut registry = ToolRegistry::new();
    register_builtin_tools(
        &mut registry,
        BuiltinTools::new(workspace).with_bash_timeout_ms(config.bash_timeout_ms),
    );

    let agent = Agent::new(
        client,
        Arc::new(registry),
        PermissionChecker::new(config.permissions.clone()),
        AgentSettings::from_config(&config),
    )
    .with_prompt(PromptContext::load(&config, &paths));
    let profile = agent.profile();
    let asking_first = agent.tools_asking_first().join(", ");

    let store = Arc::new(SessionStore::for_data_dir()?);
    let session = store.create(None)?;
    tracing::info!(session_id = %session.id, root = %store.root().display(), "session started");
    let controller = ChatController::new(Arc::new(agent), store, session);

    let input: SharedInput = Arc::new(tokio::sync::Mutex::new(
        BufReader::new(tokio::io::stdin()).lines(),
    ));
    let view = Arc::new(TerminalView::new(Arc::clone(&input)));

    println!(
        "coding_agent ({} / {}). Type /help for commands, Ctrl-C cancels a run.",
        profile.provider_id, profile.model_id
    );
    if !asking_first.is_empty() {
        println!("Asks before running: {asking_first}");
    }

    loop {
        print_flush("> ");
        let line = input.lock().await.next_line().await?;
        let Some(line) = line else {
            break;
        };

        if let Some(command) = parse_slash_command(&line) {
            if !run_command(&controller, command) {
                break;
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let mut handle = match controller.submit(&line, view.clone()) {
            Ok(handle) => handle,
            Err(error) => {
                eprintln!("{error}");
                continue;
            }
        };

        tokio::select! {
            joined = &mut handle => {
                if let Err(error) = joined {
                    tracing::error!(%error, "run task failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                view.reset_stream();
                println!("\n[cancelled]");
            }
        }
    }

    Ok(())
}

/// Returns false when the loop should exit.
fn run_command(controller: &ChatController, command: SlashCommand) -> bool {
    let report = match command {
        SlashCommand::Quit => return false,
        SlashCommand::Help => HELP_TEXT.to_string(),
        SlashCommand::Clear => match controller.reset_session(None) {
            Ok(session) => format!("Started session {}", session.id),
            Err(error) => format!("Error: {error}"),
        },
        SlashCommand::Cancel => {
            if controller.cancel() {
                "Run cancelled".to_string()
            } else {
                "No active run".to_string()
            }
        }
        SlashCommand::Sessions => match controller.store().list() {
            Ok(sessions) if sessions.is_empty() => "No sessions".to_string(),
            Ok(sessions) => sessions
                .iter()
                .map(|summary| {
                    format!(
                        "{}  {}  ({} messages, {} tokens)",
                        summary.id, summary.title, summary.message_count, summary.total_tokens
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(error) => format!("Error: {error}"),
        },
        SlashCommand::Unknown(name) => format!("Unknown command: {name}"),
    };

    println!("{report}");
    if let Err(error) = controller.note(&report) {
        tracing::warn!(%error, "failed to record command output");
    }
    true
}

/// Line-oriented view over stdout that reads confirmations from stdin.
struct TerminalView {
    input: SharedInput,
    printed: Mutex<String>,
}

impl TerminalView {
    fn new(input: SharedInput) -> Self {
        Self {
            input,
            printed: Mutex::new(String::new()),
        }
    }

    fn reset_stream(&self) {
        lock_unpoisoned(&self.printed).clear();
    }
}

#[async_trait]
impl ChatView for TerminalView {
    fn stream_text(&self, full: &str) {
        let mut printed = lock_unpoisoned(&self.printed);
        match full.strip_prefix(printed.as_str()) {
            Some(novel) => print_flush(novel),
            None => print_flush(&format!("\n{full}")),
        }
        *printed = full.to_string();
    }

    fn tool_call(&self, name: &str, input: &ToolInput) {
        println!("\n[tool] {name} {}", serde_json::Value::Object(input.clone()));
    }

    fn tool_result(&self, name: &str, output: &str) {
        let mut lines = output.lines();
        let preview: Vec<&str> = lines.by_ref().take(TOOL_RESULT_PREVIEW_LINES).collect();
        println!("[{name}] {}", preview.join("\n  "));
        let hidden = lines.count();
        if hidden > 0 {
            println!("  ... {hidden} more line(s)");
        }
    }

    fn message_committed(&self, message: &Message) {
        if message.role != Role::Assistant {
            return;
        }

        let printed = std::mem::take(&mut *lock_unpoisoned(&self.printed));
        match message.content.strip_prefix(printed.as_str()) {
            Some(rest) => println!("{rest}"),
            None => println!("\n{}", message.content),
        }
    }

    async fn confirm_tool(&self, name: &str, input: &ToolInput) -> bool {
        print_flush(&format!(
            "\nAllow {name} {}? [y/N] ",
            serde_json::Value::Object(input.clone())
        ));
        let answer = match self.input.lock().await.next_line().await {
            Ok(Some(answer)) => answer,
            Ok(None) | Err(_) => return false,
        };
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn print_flush(text: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
