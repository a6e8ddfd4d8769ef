//! Provider-agnostic contract shared by the coding agent crates.
//!
//! This crate defines the conversation data model, the model-facing wire
//! shape, and the streaming [`ModelClient`] trait. It excludes provider
//! transport details and orchestration concerns.

use std::fmt;

mod message;
mod model;

pub use message::{generate_id, Message, Role, TokenUsage, ToolCall, ToolInput, ToolResult};
pub use model::{
    AssistantPart, ModelClient, ModelMessage, ModelRequest, ModelStream, ModelToolSchema,
    StreamEvent, ToolResultPart,
};

/// Error returned while constructing/configuring a provider before any run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Error returned when a model call cannot be issued at all.
///
/// Errors raised mid-stream travel as [`StreamEvent::Error`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Immutable metadata describing a model client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

#[cfg(test)]
mod tests {
    use futures_util::stream::{self, StreamExt};

    use super::*;

    struct MinimalClient;

    #[async_trait::async_trait]
    impl ModelClient for MinimalClient {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                provider_id: "minimal".to_string(),
                model_id: "minimal-model".to_string(),
            }
        }

        async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ProviderError> {
            let echo = format!("{} message(s)", request.messages.len());
            Ok(stream::iter(vec![
                StreamEvent::text(echo.clone()),
                StreamEvent::finish(echo, TokenUsage::new(1, 1)),
            ])
            .boxed())
        }
    }

    #[test]
    fn provider_init_error_preserves_message() {
        let error = ProviderInitError::new("missing token");
        assert_eq!(error.message(), "missing token");
        assert_eq!(error.to_string(), "missing token");
    }

    #[test]
    fn provider_error_converts_from_strings() {
        let error = ProviderError::from("rate limited");
        assert_eq!(error.message(), "rate limited");
        assert_eq!(ProviderError::from(String::from("x")).to_string(), "x");
    }

    #[tokio::test]
    async fn client_stream_yields_events_in_order() {
        let client = MinimalClient;
        let request = ModelRequest {
            model_id: "minimal-model".to_string(),
            messages: vec![ModelMessage::user("hi")],
            system_prompt: "system".to_string(),
            tools: Vec::new(),
            max_output_tokens: 128,
        };

        let events: Vec<StreamEvent> = client
            .stream(request)
            .await
            .expect("stream should open")
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::text("1 message(s)"),
                StreamEvent::finish("1 message(s)", TokenUsage::new(1, 1)),
            ]
        );
        assert_eq!(client.profile().provider_id, "minimal");
    }
}
