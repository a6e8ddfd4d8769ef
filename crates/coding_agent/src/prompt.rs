//! System prompt assembly.
//!
//! The prompt is a stack of plain-text blocks: the base instructions with the
//! active personality, then global opinions, then project rules.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigPaths};

pub const PROJECT_RULES_FILE: &str = "agents.md";
pub const OPINIONS_FILE: &str = "opinions.json";
pub const DEFAULT_PERSONALITY: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Personality {
    pub id: &'static str,
    pub name: &'static str,
    pub traits: &'static str,
}

pub const PERSONALITIES: &[Personality] = &[
    Personality {
        id: "default",
        name: "Default",
        traits: "Direct and competent. Explain reasoning when a decision is not obvious \
                 and summarize what changed after editing files.",
    },
    Personality {
        id: "concise",
        name: "Concise",
        traits: "Answer in as few words as the task allows. Prefer showing code over \
                 describing it.",
    },
    Personality {
        id: "mentor",
        name: "Mentor",
        traits: "Patient and educational. Explain the why behind each change so the \
                 user learns the codebase.",
    },
];

/// Looks up a personality by id, falling back to the default.
#[must_use]
pub fn personality(id: &str) -> &'static Personality {
    PERSONALITIES
        .iter()
        .find(|personality| personality.id == id)
        .unwrap_or(&PERSONALITIES[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpinionLevel {
    Error,
    Warn,
    Info,
}

impl OpinionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionRule {
    pub id: String,
    pub level: OpinionLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct OpinionsFile {
    version: u32,
    rules: Vec<OpinionRule>,
}

/// Everything the system prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub personality: String,
    pub project_rules: Option<String>,
    pub opinions: Vec<OpinionRule>,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            personality: DEFAULT_PERSONALITY.to_string(),
            project_rules: None,
            opinions: Vec::new(),
        }
    }
}

impl PromptContext {
    /// Reads project rules and global opinions from disk. Missing or
    /// unreadable files contribute nothing.
    #[must_use]
    pub fn load(config: &Config, paths: &ConfigPaths) -> Self {
        let project_rules = read_project_rules(&paths.project_dir.join(PROJECT_RULES_FILE));
        let opinions = paths
            .global_dir
            .as_deref()
            .map(|dir| read_opinions(&dir.join(OPINIONS_FILE)))
            .unwrap_or_default();

        Self {
            personality: config.personality.clone(),
            project_rules,
            opinions,
        }
    }
}

fn read_project_rules(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(rules) => Some(rules),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "ignoring unreadable project rules");
            None
        }
    }
}

fn read_opinions(path: &Path) -> Vec<OpinionRule> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "no global opinions loaded");
            return Vec::new();
        }
    };

    match serde_json::from_str::<OpinionsFile>(&raw) {
        Ok(file) => file.rules,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "ignoring malformed opinions file");
            Vec::new()
        }
    }
}

#[must_use]
pub fn build_system_prompt(context: &PromptContext) -> String {
    let personality = personality(&context.personality);
    let mut blocks = vec![base_prompt(personality)];

    if !context.opinions.is_empty() {
        let mut block = String::from("## GLOBAL OPINIONS\n\n");
        for rule in &context.opinions {
            block.push_str(&format!("- [{}] {}: {}\n", rule.level.as_str(), rule.id, rule.text));
        }
        blocks.push(block);
    }

    if let Some(rules) = context
        .project_rules
        .as_deref()
        .map(str::trim)
        .filter(|rules| !rules.is_empty())
    {
        blocks.push(format!("## PROJECT RULES\n\n{rules}\n"));
    }

    blocks.join("\n")
}

fn base_prompt(personality: &Personality) -> String {
    format!(
        "You are a coding agent running in the user's terminal. You read, write, \
         and run code in the current workspace to complete the user's request.\n\
         \n\
         ## WORKING RULES\n\
         \n\
         - Read existing code before changing it and match its conventions.\n\
         - Keep changes minimal and scoped to the request.\n\
         - Read a file before editing it; edits replace one unique occurrence.\n\
         - Check tool results before relying on them.\n\
         - Never commit unless asked.\n\
         \n\
         ## PERSONALITY: {name}\n\
         \n\
         {traits}\n",
        name = personality.name,
        traits = personality.traits,
    )
}
