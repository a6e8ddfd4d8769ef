use serde::{Deserialize, Serialize};

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    Approved,
    Denied,
    Pending,
}

/// Allow lists consulted before a permission-gated tool runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionConfig {
    pub auto_approve: Vec<String>,
    pub always_ask: Vec<String>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            auto_approve: Vec::new(),
            always_ask: ["bash", "write", "edit"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Static permission policy. `check` is pure and never returns `Denied`;
/// that status is reserved for an interactive refusal.
#[derive(Debug, Clone, Default)]
pub struct PermissionChecker {
    config: PermissionConfig,
}

impl PermissionChecker {
    #[must_use]
    pub fn new(config: PermissionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn check(&self, tool_name: &str) -> PermissionStatus {
        let approved = self
            .config
            .auto_approve
            .iter()
            .any(|entry| entry == WILDCARD || entry == tool_name);

        if approved {
            PermissionStatus::Approved
        } else {
            PermissionStatus::Pending
        }
    }

    /// Whether `tool_name` is flagged for confirmation. Display only; `check`
    /// ignores it.
    #[must_use]
    pub fn always_asks(&self, tool_name: &str) -> bool {
        self.config
            .always_ask
            .iter()
            .any(|entry| entry == WILDCARD || entry == tool_name)
    }

    #[must_use]
    pub fn config(&self) -> &PermissionConfig {
        &self.config
    }
}
