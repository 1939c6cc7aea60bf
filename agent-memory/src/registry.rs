//! Process-wide plugin registry for memory provider backends.
//!
//! Mirrors `agent_adapters::registry::ModelProviderRegistry` and
//! `agent_kernel::orchestrator::OrchestratorRegistry`: a named factory
//! registry that constructs an instance implementing the memory contract
//! from a small config struct. §4.6 names this the **Memory** plugin
//! registry, alongside Model Provider, Orchestrator, and Tool.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use agent_primitives::registry::{FactoryRegistry, RegistryError, RegistryResult};

use crate::bus::{MemoryBus, MemoryBusBuilder};
use crate::journal::FileJournal;
use crate::vector_store_api::LocalVectorStore;
use crate::volatile::VolatileConfig;

/// Configuration handed to a registered memory provider factory.
#[derive(Debug, Clone)]
pub struct MemoryProviderConfig {
    journal_path: PathBuf,
    volatile_capacity: NonZeroUsize,
    enable_vector_store: bool,
}

impl MemoryProviderConfig {
    /// Creates a configuration whose journal is backed by a file at
    /// `journal_path`, with the default volatile capacity and no vector
    /// store.
    #[must_use]
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: journal_path.into(),
            volatile_capacity: VolatileConfig::default().capacity(),
            enable_vector_store: false,
        }
    }

    /// Overrides the volatile ring buffer capacity.
    #[must_use]
    pub fn with_volatile_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.volatile_capacity = capacity;
        self
    }

    /// Enables an in-process [`LocalVectorStore`] alongside the journal.
    #[must_use]
    pub fn with_vector_store(mut self, enable: bool) -> Self {
        self.enable_vector_store = enable;
        self
    }
}

/// Type alias for the process-wide memory provider registry.
pub type MemoryProviderRegistry = FactoryRegistry<MemoryBus, MemoryProviderConfig>;

fn construction_failed(name: &str, err: impl std::fmt::Display) -> RegistryError {
    RegistryError::Construction {
        name: name.to_owned(),
        reason: err.to_string(),
    }
}

/// Builds a registry pre-populated with the `"local"` memory provider: a
/// [`MemoryBus`] over a file-backed journal and, when
/// [`MemoryProviderConfig::with_vector_store`] is set, an in-process
/// [`LocalVectorStore`]. Embedders that need a remote vector database or
/// managed memory service register their own factory under a distinct name.
#[must_use]
pub fn builtin_providers() -> MemoryProviderRegistry {
    let registry = MemoryProviderRegistry::new();
    registry
        .register("local", |config: &MemoryProviderConfig| {
            let journal = FileJournal::open_blocking(config.journal_path.clone())
                .map_err(|err| construction_failed("local", err))?;

            let mut builder = MemoryBusBuilder::new(VolatileConfig::new(config.volatile_capacity))
                .with_journal(Arc::new(journal));
            if config.enable_vector_store {
                builder = builder.with_vector_store(Arc::new(LocalVectorStore::new()));
            }

            let bus = builder
                .build()
                .map_err(|err| construction_failed("local", err))?;
            Ok(Arc::new(bus))
        })
        .expect("builtin memory provider registration cannot collide");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("memory-registry-{}.log", uuid::Uuid::new_v4()));
        path
    }

    #[test]
    fn builtin_registry_lists_local_provider() {
        let registry = builtin_providers();
        assert_eq!(registry.list(), vec!["local".to_owned()]);
    }

    #[tokio::test]
    async fn constructs_local_bus_from_registry() {
        let registry = builtin_providers();
        let path = temp_path();
        let config = MemoryProviderConfig::new(&path).with_vector_store(true);

        let bus = registry.create("local", &config).unwrap();
        assert!(bus.vector_store().is_some());

        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }

    #[test]
    fn unknown_provider_name_errors() {
        let registry = builtin_providers();
        let err = registry
            .create("remote", &MemoryProviderConfig::new("/tmp/unused.log"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownProvider { .. }));
    }
}
