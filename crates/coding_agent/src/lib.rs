//! Terminal coding agent core.
//!
//! [`agent::Agent`] drives the round loop: stream the model, run the tools it
//! asks for under the [`permission`] policy, feed the results back, repeat.
//! [`runtime::ChatController`] owns the session on the caller side and
//! discards callbacks from stale runs.
//!
//! ## Provider bootstrap
//!
//! The provider comes from config or `CODING_AGENT_PROVIDER`. Only `mock`
//! ships; it streams scripted or echoed replies without network access.
//!
//! ## Configuration
//!
//! JSON layers are merged in order: built-in defaults,
//! `<config_dir>/coding_agent/config.json`, `<cwd>/.agent/config.json`, then
//! `CODING_AGENT_PROVIDER`, `CODING_AGENT_MODEL`, and `CODING_AGENT_LOG`.
//!
//! ```json
//! {
//!   "personality": "concise",
//!   "max_rounds": 10,
//!   "permissions": { "auto_approve": ["read", "glob", "grep"] }
//! }
//! ```
//!
//! Unknown keys are rejected. Project rules are read from
//! `<cwd>/.agent/agents.md` and global opinions from
//! `<config_dir>/coding_agent/opinions.json`.

pub mod agent;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod permission;
pub mod prompt;
pub mod providers;
pub mod registry;
pub mod runtime;
pub mod streaming;
pub mod tools;
pub mod transcript;
