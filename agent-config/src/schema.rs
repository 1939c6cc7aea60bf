//! Strongly typed configuration schema for the declarative surface described
//! in the runtime's external interfaces: logging, the LLM default, the
//! orchestration mode, per-agent overrides, MCP server descriptors, and the
//! memory/RAG subsystem.
//!
//! Every type here is a plain `serde`-deserializable mirror of the on-disk
//! document; translating a [`RuntimeConfig`] into live runtime objects
//! (`AgentManifest`, `OrchestrationMode`, ...) is the loader's job, not this
//! module's.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level aggregate matching every recognized configuration section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Structured logging defaults.
    pub logging: LoggingConfig,
    /// Default language-model provider settings.
    pub llm: LlmConfig,
    /// Orchestration mode and its agent lists.
    pub orchestration: OrchestrationConfig,
    /// Per-agent declarative overrides, keyed by agent name.
    pub agents: BTreeMap<String, AgentConfig>,
    /// Model Context Protocol discovery and connection settings.
    pub mcp: McpConfig,
    /// Memory and retrieval-augmented-generation settings.
    pub memory: MemoryConfig,
}

/// `logging` section: `{level, format}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level emitted, e.g. `"info"`, `"debug"`.
    pub level: String,
    /// Output format, e.g. `"pretty"` or `"json"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
        }
    }
}

/// `llm` section: the default model provider and its call parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Registered provider name, e.g. `"openai"`, `"ollama"`, `"anthropic"`.
    pub provider: String,
    /// Model identifier understood by the provider.
    pub model: String,
    /// Sampling temperature, when the provider supports it.
    pub temperature: Option<f64>,
    /// Maximum tokens the provider may generate.
    pub max_tokens: Option<u32>,
    /// Per-call timeout, in seconds.
    pub timeout_seconds: Option<u64>,
    /// Provider-specific base URL override (self-hosted gateways, proxies).
    pub base_url: Option<String>,
    /// Provider-specific deployment name (e.g. Azure OpenAI deployments).
    pub deployment: Option<String>,
    /// Provider-specific endpoint path override.
    pub endpoint: Option<String>,
}

/// `orchestration.mode`: the closed set of composition modes from §4.2.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationModeKind {
    /// Dynamic dispatch via `event.metadata["route"]`.
    #[default]
    Route,
    /// Chain agents in declared order.
    Sequential,
    /// Run agents concurrently.
    Collaborative,
    /// Alias accepted for `collaborative` in source configuration documents.
    Parallel,
    /// Repeat a single agent until it signals completion.
    Loop,
    /// Collaborative phase followed by a sequential phase.
    Mixed,
}

/// `orchestration` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Selected composition mode.
    pub mode: OrchestrationModeKind,
    /// Default per-event deadline, in seconds, when an agent does not
    /// declare its own `timeout`.
    pub timeout_seconds: Option<u64>,
    /// Iteration bound for `loop` mode.
    pub max_iterations: Option<u32>,
    /// Agent names invoked in order for `sequential` and the sequential
    /// phase of `mixed`.
    #[serde(default)]
    pub sequential_agents: Vec<String>,
    /// Agent names invoked concurrently for `collaborative`/`parallel` and
    /// the collaborative phase of `mixed`.
    #[serde(default)]
    pub collaborative_agents: Vec<String>,
    /// The single agent repeated by `loop` mode.
    pub loop_agent: Option<String>,
    /// Minimum fraction, in `[0, 1]`, of collaborative agents that must
    /// succeed for the phase to be considered successful.
    pub failure_threshold: Option<f64>,
    /// Upper bound on concurrently running collaborative agents.
    pub max_concurrency: Option<usize>,
    /// Name of the fallback agent invoked when `route` mode has no target.
    pub error_handler: Option<String>,
    /// Whether sequential/mixed phases continue past an agent error.
    pub continue_on_error: bool,
}

/// `agents.<name>.retry_policy`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff strategy name, e.g. `"fixed"`, `"exponential"`.
    pub backoff: Option<String>,
}

/// `agents.<name>.rate_limit`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained request rate.
    pub requests_per_second: f64,
    /// Maximum burst size above the sustained rate.
    pub burst: u32,
}

/// `agents.<name>.llm`: per-agent overrides of the default [`LlmConfig`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLlmOverride {
    /// Overridden sampling temperature.
    pub temperature: Option<f64>,
    /// Overridden maximum token count.
    pub max_tokens: Option<u32>,
}

/// `agents.<name>` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Declarative role label used to shape prompts.
    pub role: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// System prompt template.
    pub system_prompt: Option<String>,
    /// Capability identifiers advertised by this agent.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Whether the agent is eligible for scheduling.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-invocation execution deadline, in seconds.
    pub timeout_seconds: Option<u64>,
    /// Per-agent model override.
    pub llm: Option<AgentLlmOverride>,
    /// Retry envelope.
    pub retry_policy: Option<RetryPolicyConfig>,
    /// Rate limit envelope.
    pub rate_limit: Option<RateLimitConfig>,
}

const fn default_true() -> bool {
    true
}

/// `mcp.servers[].type`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpServerType {
    /// Plain TCP socket transport.
    Tcp,
    /// Standard-input/output subprocess transport.
    Stdio,
    /// WebSocket transport.
    Websocket,
    /// HTTP Server-Sent-Events transport.
    HttpSse,
    /// HTTP streaming transport (chunked response body).
    HttpStreaming,
}

/// `mcp.servers[]` entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique server name within the `mcp.servers` list.
    pub name: String,
    /// Transport used to reach the server.
    #[serde(rename = "type")]
    pub server_type: McpServerType,
    /// Host for `tcp`/`websocket`/`http_*` transports.
    pub host: Option<String>,
    /// Port for `tcp`/`websocket`/`http_*` transports.
    pub port: Option<u16>,
    /// Command line for `stdio` transports.
    pub command: Option<String>,
    /// Whether this server entry is currently active.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// `mcp` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Master switch for MCP integration.
    pub enabled: bool,
    /// Whether to actively discover tools from connected servers.
    pub enable_discovery: bool,
    /// Connection timeout, in milliseconds.
    pub connection_timeout_ms: Option<u64>,
    /// Maximum connection retry attempts.
    pub max_retries: Option<u32>,
    /// Delay between connection retries, in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Whether discovered tool descriptors are cached.
    pub cache_enabled: bool,
    /// Cache entry lifetime, in milliseconds.
    pub cache_timeout_ms: Option<u64>,
    /// Maximum simultaneous server connections.
    pub max_connections: Option<u32>,
    /// Declared MCP servers.
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// `memory.embedding` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Registered embedding provider name.
    pub provider: String,
    /// Embedding model identifier.
    pub model: String,
    /// Maximum documents embedded per batch call.
    pub max_batch_size: Option<u32>,
    /// Per-call timeout, in seconds.
    pub timeout_seconds: Option<u64>,
}

/// `memory.rag` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Master switch for retrieval-augmented generation.
    pub enable: bool,
    /// Characters (or tokens, depending on the chunker) per ingested chunk.
    pub chunk_size: Option<u32>,
    /// Overlap between adjacent chunks.
    pub overlap: Option<u32>,
    /// Maximum tokens of retrieved context injected per call.
    pub max_context_tokens: Option<u32>,
    /// Relative weight given to the caller's personal memory.
    pub personal_weight: Option<f64>,
    /// Relative weight given to shared knowledge-base results.
    pub knowledge_weight: Option<f64>,
}

/// `memory` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Registered memory provider name.
    pub provider: String,
    /// Backend connection string (DSN, URL, file path - provider defined).
    pub connection: Option<String>,
    /// Default maximum results returned per query.
    pub max_results: Option<u32>,
    /// Embedding vector dimensionality.
    pub dimensions: Option<u32>,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Retrieval-augmented-generation settings.
    pub rag: RagConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_config_defaults_are_inert() {
        let config = RuntimeConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.orchestration.mode, OrchestrationModeKind::Route);
        assert!(config.agents.is_empty());
        assert!(!config.mcp.enabled);
    }

    #[test]
    fn deserializes_minimal_sequential_document() {
        let document = r#"
            [orchestration]
            mode = "sequential"
            sequential_agents = ["researcher", "writer"]

            [agents.researcher]
            role = "research"
            system_prompt = "Investigate the topic thoroughly."

            [agents.writer]
            role = "writer"
            enabled = false
        "#;

        let config: RuntimeConfig = toml::from_str(document).expect("valid document");
        assert_eq!(config.orchestration.mode, OrchestrationModeKind::Sequential);
        assert_eq!(
            config.orchestration.sequential_agents,
            vec!["researcher".to_owned(), "writer".to_owned()]
        );
        assert!(config.agents["researcher"].enabled);
        assert!(!config.agents["writer"].enabled);
    }

    #[test]
    fn deserializes_mcp_servers() {
        let document = r#"
            [mcp]
            enabled = true

            [[mcp.servers]]
            name = "local-fs"
            type = "stdio"
            command = "mcp-fs-server"
        "#;
        let config: RuntimeConfig = toml::from_str(document).expect("valid document");
        assert!(config.mcp.enabled);
        assert_eq!(config.mcp.servers.len(), 1);
        assert_eq!(config.mcp.servers[0].server_type, McpServerType::Stdio);
    }
}
