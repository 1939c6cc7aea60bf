//! Error types surfaced while loading and validating runtime configuration.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading, parsing, or validating a configuration
/// document. Every variant here is fatal to startup per §7's propagation
/// policy: configuration errors abort before a runner is ever built.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read from disk.
    #[error("failed to read configuration file `{path}`: {source}")]
    Io {
        /// The path that could not be read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document's syntax was invalid TOML.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The document parsed but failed semantic validation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A capability name declared in `agents.<name>.capabilities` failed
    /// the capability identifier format.
    #[error("agent `{agent}` declares invalid capability `{capability}`: {reason}")]
    InvalidCapability {
        /// The owning agent's name.
        agent: String,
        /// The offending capability string.
        capability: String,
        /// Reason the capability was rejected.
        reason: String,
    },

    /// A secret reference could not be resolved.
    #[error("failed to resolve secret `{key}`: {reason}")]
    SecretResolution {
        /// The secret's lookup key.
        key: String,
        /// Reason resolution failed.
        reason: String,
    },
}
