//! Tool Manager: discovers tools submitted via `#[tool]` and keeps a
//! registry in sync with that compile-time inventory.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::registry::{self, ToolError, ToolRegistry, ToolResult};

/// Coordinates discovery, health reporting, and periodic refresh of tools
/// against a [`ToolRegistry`].
///
/// Tools are discovered exclusively from the compile-time `inventory`
/// submissions produced by the `#[tool]` macro; there is no dynamic loading
/// from disk.
#[derive(Debug, Default)]
pub struct ToolManager;

impl ToolManager {
    /// Creates a new manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Registers every tool discovered via the compile-time inventory into
    /// `registry`, returning the number of newly registered tools. Tools
    /// already present in the registry are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates any [`ToolError`] other than [`ToolError::DuplicateTool`],
    /// for example a descriptor whose metadata fails to build.
    pub fn discover(&self, registry: &ToolRegistry) -> ToolResult<usize> {
        let mut discovered = 0;
        for binding in registry::discover_all()? {
            match registry.register_binding(binding) {
                Ok(()) => discovered += 1,
                Err(ToolError::DuplicateTool { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(discovered)
    }

    /// Reports the liveness of every tool currently registered.
    ///
    /// A registered tool is, by construction, a successfully built binding;
    /// richer liveness probing (e.g. pinging a remote MCP server) belongs to
    /// the concrete tool implementation, not this contract.
    #[must_use]
    pub fn health(&self, registry: &ToolRegistry) -> Vec<(String, bool)> {
        registry
            .list()
            .into_iter()
            .map(|metadata| (metadata.name().to_owned(), true))
            .collect()
    }

    /// Spawns a background task that re-runs [`discover`](Self::discover) on
    /// a fixed interval, logging failures rather than aborting the task.
    #[must_use]
    pub fn spawn_refresh(
        self: Arc<Self>,
        registry: Arc<ToolRegistry>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.discover(&registry) {
                    Ok(0) => {}
                    Ok(count) => debug!(count, "tool manager discovered new tools"),
                    Err(err) => warn!(%err, "tool manager refresh failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolBinding, ToolFuture, ToolMetadata};
    use serde_json::Value;

    #[test]
    fn discover_is_idempotent_against_manual_registration() {
        let registry = ToolRegistry::new();
        let manager = ToolManager::new();

        let metadata = ToolMetadata::new("manual-echo", "1.0.0").unwrap();
        registry
            .register_binding(ToolBinding::new(metadata, |input: Value| -> ToolFuture {
                Box::pin(async move { Ok(input) })
            }))
            .unwrap();

        let discovered = manager.discover(&registry).unwrap();
        assert_eq!(discovered, 0);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn health_reports_every_registered_tool_as_alive() {
        let registry = ToolRegistry::new();
        let manager = ToolManager::new();

        registry
            .register_binding(ToolBinding::new(
                ToolMetadata::new("alive", "1.0.0").unwrap(),
                |input: Value| -> ToolFuture { Box::pin(async move { Ok(input) }) },
            ))
            .unwrap();

        let health = manager.health(&registry);
        assert_eq!(health, vec![("alive".to_string(), true)]);
    }
}
