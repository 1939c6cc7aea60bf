//! Re-export of the `#[tool]` attribute macro.
//!
//! Kept as its own module so callers write `#[agent_tools::macros::tool(...)]`
//! or import it directly without depending on `agent-tools-macros` themselves.

pub use agent_tools_macros::tool;
