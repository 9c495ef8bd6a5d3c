use std::sync::Arc;
use tracing::info;

use super::anthropic::AnthropicBackend;
use super::gemini::GeminiBackend;
use super::openai::OpenAiBackend;
use super::traits::Backend;
use super::types::{BackendConfig, Provider};
use crate::utils::ConfigError;

/// Factory for creating backend instances from a config record
pub struct BackendFactory;

impl BackendFactory {
    /// Build the adapter for `config`.
    ///
    /// `Ok(None)` means "nothing configured": no record, or an empty API key
    /// for a provider that needs one. Unknown providers and a missing base URL
    /// for `openai-compatible` are hard errors.
    pub fn create(config: Option<&BackendConfig>) -> Result<Option<Arc<dyn Backend>>, ConfigError> {
        let Some(config) = config else {
            return Ok(None);
        };

        let provider: Provider = config.provider.parse()?;

        if provider.requires_base_url() && config.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl(provider));
        }

        if config.api_key.trim().is_empty() && !provider.allows_missing_key() {
            info!("No API key for {}; backend not configured", provider);
            return Ok(None);
        }

        let backend: Arc<dyn Backend> = match provider {
            Provider::Anthropic => Arc::new(AnthropicBackend::new(config)?),
            Provider::OpenAi | Provider::OpenAiCompatible => {
                Arc::new(OpenAiBackend::new(provider, config)?)
            },
            Provider::Gemini => Arc::new(GeminiBackend::new(config)?),
        };

        info!(
            "Created {} backend (model={}, native_tools={})",
            provider,
            backend.model(),
            backend.supports_native_tools()
        );
        Ok(Some(backend))
    }
}
