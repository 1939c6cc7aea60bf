//! Observability utilities for agents: tracing initialization, in-process
//! metrics counters, health snapshots, and deterministic trace replay.

#![warn(missing_docs, clippy::pedantic)]

/// Health reporting utilities.
pub mod health;
/// Metrics exporter configuration.
pub mod metrics;
/// Replay and deterministic debugging utilities.
pub mod replay;
/// Structured tracing helpers.
pub mod tracing_support;
