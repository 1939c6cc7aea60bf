//! Loads a [`RuntimeConfig`] from a TOML document on disk and converts its
//! declarative sections into the live domain objects the kernel expects:
//! [`AgentManifest`]s and an [`OrchestrationMode`].
//!
//! This is deliberately the only place configuration file I/O happens in the
//! workspace; everything else operates on already-parsed, already-validated
//! structs.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use agent_kernel::OrchestrationMode;
use agent_primitives::{AgentId, AgentManifest, Capability, CapabilityId, RateLimit};
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{AgentConfig, OrchestrationConfig, OrchestrationModeKind, RuntimeConfig};

/// Reads and parses a [`RuntimeConfig`] from `path`, then validates it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
/// if it is not valid TOML, and [`ConfigError::Invalid`] if it parses but
/// fails semantic validation (per [`validate`]).
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<RuntimeConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: RuntimeConfig = toml::from_str(&raw)?;
    validate(&config)?;
    debug!(agents = config.agents.len(), "loaded runtime configuration");
    Ok(config)
}

/// Parses a [`RuntimeConfig`] from an in-memory TOML document, then validates
/// it. Useful for embedders that assemble configuration without a file.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] on malformed TOML and [`ConfigError::Invalid`]
/// when semantic validation fails.
pub fn load_from_str(raw: &str) -> ConfigResult<RuntimeConfig> {
    let config: RuntimeConfig = toml::from_str(raw)?;
    validate(&config)?;
    Ok(config)
}

/// Validates cross-field invariants that `serde` alone cannot express,
/// mirroring the orchestrator's own `try_new` validation (§4.2) so
/// misconfiguration is caught at load time rather than at first dispatch.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when:
/// - `sequential`/`mixed` names zero sequential agents;
/// - `loop` names no `loop_agent` or declares `max_iterations <= 0`;
/// - `collaborative`/`mixed` names zero collaborative agents;
/// - any `failure_threshold` falls outside `[0, 1]`;
/// - `orchestration.error_handler` or any agent list names an agent absent
///   from the `agents` table and not equal to the error handler itself.
pub fn validate(config: &RuntimeConfig) -> ConfigResult<()> {
    let orch = &config.orchestration;
    match orch.mode {
        OrchestrationModeKind::Sequential => {
            require_non_empty(&orch.sequential_agents, "orchestration.sequential_agents")?;
        }
        OrchestrationModeKind::Collaborative | OrchestrationModeKind::Parallel => {
            require_non_empty(
                &orch.collaborative_agents,
                "orchestration.collaborative_agents",
            )?;
            check_threshold(orch.failure_threshold)?;
        }
        OrchestrationModeKind::Loop => {
            if orch.loop_agent.is_none() {
                return Err(ConfigError::Invalid {
                    reason: "orchestration.mode = \"loop\" requires orchestration.loop_agent"
                        .into(),
                });
            }
            if orch.max_iterations.is_none_or(|n| n == 0) {
                return Err(ConfigError::Invalid {
                    reason: "orchestration.mode = \"loop\" requires max_iterations > 0".into(),
                });
            }
        }
        OrchestrationModeKind::Mixed => {
            require_non_empty(
                &orch.collaborative_agents,
                "orchestration.collaborative_agents",
            )?;
            require_non_empty(&orch.sequential_agents, "orchestration.sequential_agents")?;
            check_threshold(orch.failure_threshold)?;
        }
        OrchestrationModeKind::Route => {}
    }

    for name in referenced_agent_names(orch) {
        if !config.agents.contains_key(name) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "orchestration references agent `{name}` with no matching [agents.{name}] section"
                ),
            });
        }
    }

    for (name, agent) in &config.agents {
        for capability in &agent.capabilities {
            CapabilityId::new(capability.clone()).map_err(|source| {
                ConfigError::InvalidCapability {
                    agent: name.clone(),
                    capability: capability.clone(),
                    reason: source.to_string(),
                }
            })?;
        }
    }

    Ok(())
}

fn require_non_empty(agents: &[String], field: &str) -> ConfigResult<()> {
    if agents.is_empty() {
        return Err(ConfigError::Invalid {
            reason: format!("{field} must name at least one agent"),
        });
    }
    Ok(())
}

fn check_threshold(threshold: Option<f64>) -> ConfigResult<()> {
    if let Some(threshold) = threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                reason: format!("orchestration.failure_threshold {threshold} is outside [0, 1]"),
            });
        }
    }
    Ok(())
}

fn referenced_agent_names(orch: &OrchestrationConfig) -> Vec<&str> {
    let mut names: Vec<&str> = orch
        .sequential_agents
        .iter()
        .chain(&orch.collaborative_agents)
        .map(String::as_str)
        .collect();
    if let Some(loop_agent) = &orch.loop_agent {
        names.push(loop_agent);
    }
    names
}

/// Converts the validated `orchestration` section into a kernel
/// [`OrchestrationMode`] ready to hand to `ModeOrchestrator::try_new`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for the same conditions [`validate`]
/// checks, so this can be called directly by embedders that already have a
/// config value without a prior `validate` call.
pub fn to_orchestration_mode(config: &RuntimeConfig) -> ConfigResult<OrchestrationMode> {
    validate(config)?;
    let orch = &config.orchestration;
    let mode = match orch.mode {
        OrchestrationModeKind::Route => OrchestrationMode::Route,
        OrchestrationModeKind::Sequential => OrchestrationMode::Sequential {
            agents: orch.sequential_agents.clone(),
            continue_on_error: orch.continue_on_error,
        },
        OrchestrationModeKind::Collaborative | OrchestrationModeKind::Parallel => {
            OrchestrationMode::Collaborative {
                agents: orch.collaborative_agents.clone(),
                failure_threshold: orch.failure_threshold.unwrap_or(1.0),
                max_concurrency: orch.max_concurrency,
            }
        }
        OrchestrationModeKind::Loop => OrchestrationMode::Loop {
            agent: orch.loop_agent.clone().unwrap_or_default(),
            max_iterations: orch.max_iterations.unwrap_or(0),
        },
        OrchestrationModeKind::Mixed => OrchestrationMode::Mixed {
            collaborative_agents: orch.collaborative_agents.clone(),
            failure_threshold: orch.failure_threshold.unwrap_or(1.0),
            sequential_agents: orch.sequential_agents.clone(),
            continue_on_error: orch.continue_on_error,
        },
    };
    Ok(mode)
}

/// Converts every `agents.<name>` entry into an [`AgentManifest`], keyed by
/// name. The kernel's handler registration still pairs each manifest with a
/// concrete [`agent_kernel::AgentHandler`]; this only builds the declarative
/// half.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidCapability`] if a declared capability name
/// fails the capability identifier format.
pub fn to_agent_manifests(config: &RuntimeConfig) -> ConfigResult<BTreeMap<String, AgentManifest>> {
    config
        .agents
        .iter()
        .map(|(name, agent)| Ok((name.clone(), to_agent_manifest(name, agent)?)))
        .collect()
}

fn to_agent_manifest(name: &str, agent: &AgentConfig) -> ConfigResult<AgentManifest> {
    let mut builder = AgentManifest::builder(AgentId::random());
    builder = builder.name(name).map_err(|source| ConfigError::Invalid {
        reason: source.to_string(),
    })?;
    if let Some(role) = &agent.role {
        builder = builder.role(role.clone());
    }
    if let Some(description) = &agent.description {
        builder = builder.description(description.clone());
    }
    if let Some(system_prompt) = &agent.system_prompt {
        builder = builder.system_prompt(system_prompt.clone());
    }
    builder = builder.enabled(agent.enabled);
    if let Some(timeout_seconds) = agent.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(timeout_seconds));
    }
    if let Some(retry_policy) = &agent.retry_policy {
        builder = builder.max_retries(retry_policy.max_retries);
    }
    if let Some(rate_limit) = agent.rate_limit {
        builder = builder.rate_limit(RateLimit::new(
            rate_limit.requests_per_second,
            rate_limit.burst,
        ));
    }

    let capabilities = agent
        .capabilities
        .iter()
        .map(|capability| {
            let id = CapabilityId::new(capability.clone()).map_err(|source| {
                ConfigError::InvalidCapability {
                    agent: name.to_owned(),
                    capability: capability.clone(),
                    reason: source.to_string(),
                }
            })?;
            Capability::builder(id)
                .name(capability.clone())
                .and_then(|b| b.version("0.1.0"))
                .and_then(|b| b.add_scope(capability.clone()))
                .and_then(agent_primitives::CapabilityBuilder::build)
                .map_err(|source| ConfigError::InvalidCapability {
                    agent: name.to_owned(),
                    capability: capability.clone(),
                    reason: source.to_string(),
                })
        })
        .collect::<ConfigResult<Vec<_>>>()?;
    builder = builder.capabilities(capabilities);

    builder.build().map_err(|source| ConfigError::Invalid {
        reason: source.to_string(),
    })
}
