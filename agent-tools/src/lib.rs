//! Tool discovery and capability enforcement utilities.
//!
//! The modules exposed here make it possible to register annotated tool
//! functions, associate capability metadata, discover them at process
//! startup via compile-time inventory submission, and invoke them at
//! runtime.

#![warn(missing_docs, clippy::pedantic)]

/// Re-exports the `#[tool]` attribute macro.
pub mod macros;
/// Discovery and periodic refresh of tools registered via `#[tool]`.
pub mod manager;
/// Tool registry and execution runtime.
pub mod registry;

pub use inventory;
