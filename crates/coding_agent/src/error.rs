use std::path::PathBuf;

use agent_provider::ProviderError;
use session_store::SessionStoreError;

/// Fatal run failure reported through `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("Model stream error: {0}")]
    Stream(String),
    #[error("Agent run panicked: {0}")]
    Panicked(String),
}

impl AgentError {
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::Panicked(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config {path} must contain a JSON object")]
    NotAnObject { path: PathBuf },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Run already active")]
    RunActive,
    #[error("Message must not be empty")]
    EmptyInput,
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_normalized() {
        let from_str: Box<dyn std::any::Any + Send> = Box::new("bad state");
        let from_string: Box<dyn std::any::Any + Send> = Box::new("owned".to_string());
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);

        assert_eq!(
            AgentError::from_panic(from_str.as_ref()).to_string(),
            "Agent run panicked: bad state"
        );
        assert_eq!(
            AgentError::from_panic(from_string.as_ref()),
            AgentError::Panicked("owned".to_string())
        );
        assert_eq!(
            AgentError::from_panic(other.as_ref()),
            AgentError::Panicked("unknown panic payload".to_string())
        );
    }

    #[test]
    fn provider_errors_display_their_message() {
        let error = AgentError::from(ProviderError::new("rate limited"));
        assert_eq!(error.to_string(), "rate limited");
    }
}
