//! Health reporting: a named-component liveness snapshot.

use serde::{Deserialize, Serialize};

/// Liveness state of a single monitored component.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Component is operating normally.
    Healthy,
    /// Component is reachable but degraded.
    Degraded,
    /// Component is unreachable or failing.
    Unhealthy,
}

/// A single component's health entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthEntry {
    name: String,
    state: HealthState,
    detail: Option<String>,
}

impl HealthEntry {
    /// Creates an entry for `name` in the given state.
    #[must_use]
    pub fn new(name: impl Into<String>, state: HealthState) -> Self {
        Self {
            name: name.into(),
            state,
            detail: None,
        }
    }

    /// Attaches a human-readable detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns the component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the reported state.
    #[must_use]
    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Returns the optional detail message.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Aggregated health snapshot across monitored components.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealthReport {
    entries: Vec<HealthEntry>,
}

impl HealthReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry to the report.
    pub fn push(&mut self, entry: HealthEntry) {
        self.entries.push(entry);
    }

    /// Returns the recorded entries.
    #[must_use]
    pub fn entries(&self) -> &[HealthEntry] {
        &self.entries
    }

    /// Returns `true` when every entry reports [`HealthState::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.entries.iter().all(|entry| entry.state == HealthState::Healthy)
    }
}
