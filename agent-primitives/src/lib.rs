//! Core shared types and traits for agent runtimes: identifiers, capabilities,
//! agent descriptors, and the generic provider registry they all build on.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod error;
mod ids;
mod manifest;
pub mod registry;

/// Capability descriptors and supporting builders.
pub use capability::{Capability, CapabilityBuilder, CapabilityId};
/// Error type and result alias shared across the SDK.
pub use error::{Error, Result};
/// Unique identifier for agents within a runtime.
pub use ids::AgentId;
/// Declarative agent descriptor used by the runner and orchestrator.
pub use manifest::{AgentManifest, AgentManifestBuilder, RateLimit};
/// Generic factory registry shared by the provider, orchestrator, and memory registries.
pub use registry::{FactoryRegistry, RegistryError, RegistryResult};
