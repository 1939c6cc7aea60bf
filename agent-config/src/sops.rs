//! Secret resolution contract for values embedded in configuration (API
//! keys, connection strings). Concrete integrations with a secrets manager
//! or an encrypted-at-rest store such as SOPS are external collaborators per
//! §1; this module only fixes the narrow interface they implement and ships
//! the one resolver that needs no external system.

use std::collections::HashMap;
use std::env;

use crate::error::ConfigError;

/// Resolves an opaque secret reference (a lookup key) to its plaintext
/// value. Implementations may consult environment variables, a vault
/// client, or a decrypted SOPS document; this crate only depends on the
/// trait, never a concrete backend.
pub trait SecretResolver: Send + Sync {
    /// Resolves `key` to its plaintext value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SecretResolution`] if `key` has no known
    /// value.
    fn resolve(&self, key: &str) -> Result<String, ConfigError>;
}

/// Resolves secrets from process environment variables, matching the
/// convention used by every adapter in `agent-adapters` (`OPENAI_API_KEY`,
/// `ANTHROPIC_API_KEY`, ...).
#[derive(Debug, Default)]
pub struct EnvSecretResolver;

impl SecretResolver for EnvSecretResolver {
    fn resolve(&self, key: &str) -> Result<String, ConfigError> {
        env::var(key).map_err(|_| ConfigError::SecretResolution {
            key: key.to_owned(),
            reason: "environment variable not set".into(),
        })
    }
}

/// Resolves secrets from an in-memory map, useful for tests and for
/// embedders that have already decrypted a SOPS document themselves.
#[derive(Debug, Default)]
pub struct StaticSecretResolver {
    values: HashMap<String, String>,
}

impl StaticSecretResolver {
    /// Creates a resolver backed by `values`.
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl SecretResolver for StaticSecretResolver {
    fn resolve(&self, key: &str) -> Result<String, ConfigError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::SecretResolution {
                key: key.to_owned(),
                reason: "key not present in static secret map".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_resolver_round_trips() {
        let mut values = HashMap::new();
        values.insert("OPENAI_API_KEY".to_owned(), "sk-test".to_owned());
        let resolver = StaticSecretResolver::new(values);
        assert_eq!(resolver.resolve("OPENAI_API_KEY").unwrap(), "sk-test");
    }

    #[test]
    fn static_resolver_reports_missing_key() {
        let resolver = StaticSecretResolver::new(HashMap::new());
        let err = resolver.resolve("MISSING").unwrap_err();
        assert!(matches!(err, ConfigError::SecretResolution { .. }));
    }
}
