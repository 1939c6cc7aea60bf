//! Typed configuration schema and file loader for the agent runtime.
//!
//! Covers the declarative surface recognized by `new_runner_from_config`:
//! logging defaults, the default LLM provider, the orchestration mode and
//! its agent lists, per-agent overrides, MCP server descriptors, and the
//! memory/RAG subsystem. Loading and validating a document is the only I/O
//! this crate performs; wiring a concrete secrets manager, remote config
//! server, or file watcher is left to the embedder.

#![warn(missing_docs, clippy::pedantic)]

/// Reads and validates [`RuntimeConfig`] documents, and converts validated
/// sections into kernel domain objects.
pub mod loader;
/// Strongly typed configuration schemas.
pub mod schema;
/// Secret resolution contract for values embedded in configuration.
pub mod sops;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_path, load_from_str, to_agent_manifests, to_orchestration_mode, validate};
pub use schema::{
    AgentConfig, AgentLlmOverride, EmbeddingConfig, LlmConfig, LoggingConfig, McpConfig,
    McpServerConfig, McpServerType, MemoryConfig, OrchestrationConfig, OrchestrationModeKind,
    RagConfig, RateLimitConfig, RetryPolicyConfig, RuntimeConfig,
};
pub use sops::{EnvSecretResolver, SecretResolver, StaticSecretResolver};

mod error;

/// Loads a [`RuntimeConfig`] from `path`, falling back to the
/// process environment for any field left blank in the document. Intended
/// as the one-line convenience call for CLIs and example binaries; library
/// code should call [`loader::load_from_path`] directly and handle
/// [`ConfigError`] explicitly.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails
/// validation.
pub fn load_runtime_config(path: impl AsRef<std::path::Path>) -> anyhow::Result<RuntimeConfig> {
    let config = loader::load_from_path(path)?;
    Ok(config)
}
