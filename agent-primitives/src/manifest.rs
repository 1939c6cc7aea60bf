//! Declarative agent descriptors: identity, prompt shaping metadata, and execution envelope.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AgentId, Capability};

#[cfg(test)]
use crate::{CapabilityBuilder, CapabilityId};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Rate limiting envelope applied to a single agent's invocations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    requests_per_second: f64,
    burst: u32,
}

impl RateLimit {
    /// Creates a new rate limit descriptor.
    #[must_use]
    pub const fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            requests_per_second,
            burst,
        }
    }

    /// Sustained request rate.
    #[must_use]
    pub const fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    /// Maximum burst size above the sustained rate.
    #[must_use]
    pub const fn burst(&self) -> u32 {
        self.burst
    }
}

/// Declarative, addressable unit of work known to the runner and orchestrator.
///
/// `name` is the lookup key used by the orchestrator's Route mode and by
/// `Runner::register_agent`; the remaining fields are metadata handlers use to
/// shape prompts (`role`, `description`, `system_prompt`, `capabilities`) and the
/// execution envelope the runner enforces (`enabled`, `timeout`, `max_retries`,
/// `rate_limit`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentManifest {
    id: AgentId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<Capability>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_timeout")]
    timeout: Duration,
    #[serde(default)]
    max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimit>,
}

const fn default_enabled() -> bool {
    true
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl AgentManifest {
    /// Starts building an [`AgentManifest`].
    #[must_use]
    pub fn builder(id: AgentId) -> AgentManifestBuilder {
        AgentManifestBuilder {
            id,
            name: None,
            role: None,
            description: None,
            system_prompt: None,
            capabilities: Vec::new(),
            enabled: true,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            rate_limit: None,
        }
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Returns the agent's registration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared role, if any.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the system prompt template used to shape model requests.
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Returns the advertised capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns whether this agent may currently be scheduled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the per-invocation execution deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the maximum retry count the runner may apply.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the configured rate limit envelope, if any.
    #[must_use]
    pub const fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }
}

/// Builder for [`AgentManifest`].
#[derive(Debug)]
pub struct AgentManifestBuilder {
    id: AgentId,
    name: Option<String>,
    role: Option<String>,
    description: Option<String>,
    system_prompt: Option<String>,
    capabilities: Vec<Capability>,
    enabled: bool,
    timeout: Duration,
    max_retries: u32,
    rate_limit: Option<RateLimit>,
}

impl AgentManifestBuilder {
    /// Sets the agent's registration name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCapability`] when the name is empty.
    pub fn name(mut self, name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidCapability {
                reason: "agent name cannot be empty".into(),
            });
        }
        self.name = Some(name);
        Ok(self)
    }

    /// Sets the declared role.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets an optional description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the system prompt template.
    #[must_use]
    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Replaces the capability set.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets whether the agent may be scheduled (defaults to `true`).
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the per-invocation execution deadline (defaults to 30s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum retry count.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the rate limit envelope.
    #[must_use]
    pub const fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Consumes the builder and returns the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCapability`] if mandatory fields are missing.
    pub fn build(self) -> crate::Result<AgentManifest> {
        let name = self.name.ok_or_else(|| crate::Error::InvalidCapability {
            reason: "agent name must be provided".into(),
        })?;

        Ok(AgentManifest {
            id: self.id,
            name,
            role: self.role,
            description: self.description,
            system_prompt: self.system_prompt,
            capabilities: self.capabilities,
            enabled: self.enabled,
            timeout: self.timeout,
            max_retries: self.max_retries,
            rate_limit: self.rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_capability() -> Capability {
        Capability::builder(CapabilityId::new("test.cap").expect("id"))
            .name("Test")
            .and_then(|b| b.version("1.0.0"))
            .and_then(|b| b.add_scope("read:test"))
            .and_then(CapabilityBuilder::build)
            .expect("capability")
    }

    #[test]
    fn builds_manifest_with_defaults() {
        let manifest = AgentManifest::builder(AgentId::random())
            .name("researcher")
            .unwrap()
            .role("research")
            .system_prompt("You are a careful researcher.")
            .capabilities(vec![base_capability()])
            .build()
            .unwrap();

        assert_eq!(manifest.name(), "researcher");
        assert_eq!(manifest.role(), Some("research"));
        assert!(manifest.enabled());
        assert_eq!(manifest.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(manifest.capabilities().len(), 1);
    }

    #[test]
    fn name_is_required() {
        let result = AgentManifest::builder(AgentId::random()).build();
        assert!(result.is_err());
    }

    #[test]
    fn disabled_agent_reports_disabled() {
        let manifest = AgentManifest::builder(AgentId::random())
            .name("retired")
            .unwrap()
            .enabled(false)
            .build()
            .unwrap();
        assert!(!manifest.enabled());
    }

    #[test]
    fn rate_limit_round_trips() {
        let manifest = AgentManifest::builder(AgentId::random())
            .name("limited")
            .unwrap()
            .rate_limit(RateLimit::new(2.5, 5))
            .build()
            .unwrap();
        let limit = manifest.rate_limit().expect("rate limit");
        assert_eq!(limit.requests_per_second(), 2.5);
        assert_eq!(limit.burst(), 5);
    }
}
