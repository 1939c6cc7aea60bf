//! Model Provider plugin registry: register named factories, construct
//! provider instances from configuration per §4.6's "factory yields an
//! instance" contract.

use std::sync::Arc;

use agent_primitives::registry::{FactoryRegistry, RegistryError, RegistryResult};

use crate::anthropic::{AnthropicAdapter, AnthropicConfig};
use crate::gemini::{GeminiAdapter, GeminiConfig};
use crate::ollama::{OllamaAdapter, OllamaConfig};
use crate::openai::{OpenAiAdapter, OpenAiConfig};
use crate::traits::ModelAdapter;

/// Provider-agnostic construction parameters, mirroring `agent-config`'s
/// `LlmConfig` section so a `ModelProviderRegistry` can be driven directly
/// from the declarative configuration surface.
#[derive(Clone, Debug, Default)]
pub struct ModelProviderConfig {
    /// Model identifier understood by the target provider.
    pub model: String,
    /// Explicit API key; falls back to the provider's environment variable
    /// when omitted.
    pub api_key: Option<String>,
    /// Provider-specific base URL override.
    pub base_url: Option<String>,
    /// Sampling temperature, when the provider supports it.
    pub temperature: Option<f32>,
    /// Enables deterministic mocked responses for offline operation.
    pub mock_responses: bool,
}

impl ModelProviderConfig {
    /// Creates a configuration for the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the provider's base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the default sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enables mocked responses for offline testing.
    #[must_use]
    pub fn with_mock_responses(mut self, enabled: bool) -> Self {
        self.mock_responses = enabled;
        self
    }
}

fn construction_failed(name: &str, err: impl std::fmt::Display) -> RegistryError {
    RegistryError::Construction {
        name: name.to_owned(),
        reason: err.to_string(),
    }
}

/// Registry of named [`ModelAdapter`] factories, keyed by provider name.
pub type ModelProviderRegistry = FactoryRegistry<dyn ModelAdapter, ModelProviderConfig>;

/// Builds a [`ModelProviderRegistry`] pre-populated with the four adapters
/// this crate ships, registered under their canonical provider names.
#[must_use]
pub fn builtin_providers() -> ModelProviderRegistry {
    let registry = ModelProviderRegistry::new();

    registry
        .register("ollama", |config: &ModelProviderConfig| {
            let mut cfg = OllamaConfig::new(config.model.clone())
                .with_mock_responses(config.mock_responses);
            if let Some(base_url) = &config.base_url {
                cfg = cfg
                    .with_base_url(base_url)
                    .map_err(|err| construction_failed("ollama", err))?;
            }
            if let Some(temperature) = config.temperature {
                cfg = cfg.with_default_temperature(temperature);
            }
            let adapter =
                OllamaAdapter::new(cfg).map_err(|err| construction_failed("ollama", err))?;
            Ok(Arc::new(adapter) as Arc<dyn ModelAdapter>)
        })
        .expect("builtin ollama registration is unique");

    registry
        .register("openai", |config: &ModelProviderConfig| {
            let mut cfg = OpenAiConfig::new(config.model.clone())
                .with_mock_responses(config.mock_responses);
            if let Some(api_key) = &config.api_key {
                cfg = cfg.with_api_key(api_key.clone());
            }
            if let Some(temperature) = config.temperature {
                cfg = cfg.with_default_temperature(temperature);
            }
            Ok(Arc::new(OpenAiAdapter::new(cfg)) as Arc<dyn ModelAdapter>)
        })
        .expect("builtin openai registration is unique");

    registry
        .register("anthropic", |config: &ModelProviderConfig| {
            let mut cfg = AnthropicConfig::new(config.model.clone());
            if let Some(api_key) = &config.api_key {
                cfg = cfg.with_api_key(api_key.clone());
            }
            if let Some(base_url) = &config.base_url {
                cfg = cfg
                    .with_base_url(base_url)
                    .map_err(|err| construction_failed("anthropic", err))?;
            }
            if let Some(temperature) = config.temperature {
                cfg = cfg.with_default_temperature(temperature);
            }
            let adapter =
                AnthropicAdapter::new(cfg).map_err(|err| construction_failed("anthropic", err))?;
            Ok(Arc::new(adapter) as Arc<dyn ModelAdapter>)
        })
        .expect("builtin anthropic registration is unique");

    registry
        .register("gemini", |config: &ModelProviderConfig| {
            let mut cfg = GeminiConfig::new(config.model.clone());
            if let Some(api_key) = &config.api_key {
                cfg = cfg.with_api_key(api_key.clone());
            }
            if let Some(base_url) = &config.base_url {
                cfg = cfg
                    .with_base_url(base_url)
                    .map_err(|err| construction_failed("gemini", err))?;
            }
            if let Some(temperature) = config.temperature {
                cfg = cfg.with_default_temperature(temperature);
            }
            let adapter =
                GeminiAdapter::new(cfg).map_err(|err| construction_failed("gemini", err))?;
            Ok(Arc::new(adapter) as Arc<dyn ModelAdapter>)
        })
        .expect("builtin gemini registration is unique");

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_four_providers() {
        let registry = builtin_providers();
        assert_eq!(
            registry.list(),
            vec![
                "anthropic".to_owned(),
                "gemini".to_owned(),
                "ollama".to_owned(),
                "openai".to_owned(),
            ]
        );
    }

    #[test]
    fn constructs_mocked_ollama_from_registry() {
        let registry = builtin_providers();
        let config = ModelProviderConfig::new("gemma3").with_mock_responses(true);
        let adapter = registry.create("ollama", &config).expect("adapter");
        assert_eq!(adapter.metadata().provider(), "ollama");
    }

    #[test]
    fn unknown_provider_name_errors() {
        let registry = builtin_providers();
        let err = registry
            .create("mistral", &ModelProviderConfig::new("x"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownProvider { .. }));
    }

    #[test]
    fn anthropic_without_api_key_fails_construction() {
        let registry = builtin_providers();
        let err = registry
            .create("anthropic", &ModelProviderConfig::new("claude-3-5-sonnet-20241022"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Construction { .. }));
    }
}
