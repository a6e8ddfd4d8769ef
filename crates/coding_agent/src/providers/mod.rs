use std::sync::Arc;

use agent_provider::{ModelClient, ProviderInitError};
use agent_provider_mock::{MockModelClient, MOCK_PROVIDER_ID};

pub const DEFAULT_PROVIDER_ID: &str = MOCK_PROVIDER_ID;

/// Resolves a model client by provider id. Only the offline mock ships.
pub fn provider_for_id(
    provider_id: &str,
    model_id: &str,
) -> Result<Arc<dyn ModelClient>, ProviderInitError> {
    match provider_id.trim() {
        MOCK_PROVIDER_ID => Ok(Arc::new(MockModelClient::default().with_model_id(model_id))),
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {DEFAULT_PROVIDER_ID}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_for_id_supports_mock() {
        let provider = provider_for_id("mock", "tiny").expect("mock provider should resolve");
        let profile = provider.profile();

        assert_eq!(profile.provider_id, "mock");
        assert_eq!(profile.model_id, "tiny");
    }

    #[test]
    fn provider_for_id_rejects_unknown_provider() {
        let error = match provider_for_id("custom", "model") {
            Ok(_) => panic!("unknown providers should fail"),
            Err(error) => error,
        };

        assert!(error.message().contains("Unsupported provider 'custom'"));
    }
}
