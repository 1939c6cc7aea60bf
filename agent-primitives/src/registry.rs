//! Generic factory registry backing the runtime's pluggable provider surfaces.
//!
//! Model providers, orchestrators, and memory providers are all "register a
//! named factory, construct instances from config" surfaces. Rather than
//! duplicating the bookkeeping three times, each of those registries wraps a
//! [`FactoryRegistry`]. The tool registry does not: tools are registered as
//! direct invocables rather than factories, so it keeps its own shape.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Errors produced while registering or constructing providers.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A factory was already registered under this name.
    #[error("provider '{name}' is already registered")]
    DuplicateProvider {
        /// The name that collided.
        name: String,
    },
    /// No factory is registered under this name.
    #[error("no provider registered for '{name}'")]
    UnknownProvider {
        /// The name that was looked up.
        name: String,
    },
    /// The factory was found but failed to construct an instance.
    #[error("provider '{name}' failed to construct: {reason}")]
    Construction {
        /// The provider name.
        name: String,
        /// The underlying failure reason.
        reason: String,
    },
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

type Factory<T, C> = Arc<dyn Fn(&C) -> RegistryResult<Arc<T>> + Send + Sync>;

/// A read-mostly, name-keyed registry of construction factories.
///
/// Registration happens at process init time; lookups happen continuously
/// from worker tasks, so the registry favors a lock that is cheap to read
/// under contention over one optimized for writes.
pub struct FactoryRegistry<T: ?Sized, C> {
    factories: RwLock<HashMap<String, Factory<T, C>>>,
}

impl<T: ?Sized, C> fmt::Debug for FactoryRegistry<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.list();
        f.debug_struct("FactoryRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl<T: ?Sized, C> Default for FactoryRegistry<T, C> {
    fn default() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized, C> FactoryRegistry<T, C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named factory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateProvider`] if `name` is already registered.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> RegistryResult<()>
    where
        F: Fn(&C) -> RegistryResult<Arc<T>> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut guard = self
            .factories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.contains_key(&name) {
            return Err(RegistryError::DuplicateProvider { name });
        }
        guard.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Replaces any existing factory registered under `name`.
    pub fn register_override<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&C) -> RegistryResult<Arc<T>> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut guard = self
            .factories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(name, Arc::new(factory));
    }

    /// Constructs a new instance from the named factory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownProvider`] if no factory is registered
    /// under `name`, or [`RegistryError::Construction`] if the factory itself
    /// fails.
    pub fn create(&self, name: &str, config: &C) -> RegistryResult<Arc<T>> {
        let factory = {
            let guard = self
                .factories
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownProvider { name: name.into() })?
        };
        factory(config)
    }

    /// Returns whether a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(name)
    }

    /// Lists the names of all registered factories.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let guard = self
            .factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes a registered factory, returning whether one existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.factories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget(u32);
    struct Config {
        scale: u32,
    }

    #[test]
    fn registers_and_constructs() {
        let registry: FactoryRegistry<Widget, Config> = FactoryRegistry::new();
        registry
            .register("small", |cfg: &Config| Ok(Arc::new(Widget(cfg.scale))))
            .unwrap();

        let widget = registry.create("small", &Config { scale: 4 }).unwrap();
        assert_eq!(widget.0, 4);
    }

    #[test]
    fn duplicate_registration_errors() {
        let registry: FactoryRegistry<Widget, Config> = FactoryRegistry::new();
        registry
            .register("small", |cfg: &Config| Ok(Arc::new(Widget(cfg.scale))))
            .unwrap();

        let err = registry
            .register("small", |cfg: &Config| Ok(Arc::new(Widget(cfg.scale))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProvider { .. }));
    }

    #[test]
    fn unknown_provider_errors() {
        let registry: FactoryRegistry<Widget, Config> = FactoryRegistry::new();
        let err = registry.create("missing", &Config { scale: 1 }).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownProvider { .. }));
    }

    #[test]
    fn construction_failure_propagates() {
        let registry: FactoryRegistry<Widget, Config> = FactoryRegistry::new();
        registry
            .register("broken", |_: &Config| {
                Err(RegistryError::Construction {
                    name: "broken".into(),
                    reason: "always fails".into(),
                })
            })
            .unwrap();

        let err = registry.create("broken", &Config { scale: 1 }).unwrap_err();
        assert!(matches!(err, RegistryError::Construction { .. }));
    }

    #[test]
    fn list_is_sorted() {
        let registry: FactoryRegistry<Widget, Config> = FactoryRegistry::new();
        registry
            .register("zeta", |cfg: &Config| Ok(Arc::new(Widget(cfg.scale))))
            .unwrap();
        registry
            .register("alpha", |cfg: &Config| Ok(Arc::new(Widget(cfg.scale))))
            .unwrap();
        assert_eq!(registry.list(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
