//! In-process counters for agent invocation metrics.
//!
//! This is an aggregator, not an exporter; wire a snapshot to a metrics
//! backend (Prometheus, `StatsD`, etc.) on an interval as needed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulates counts and latency totals across agent invocations.
#[derive(Debug, Default)]
pub struct AgentMetricsCollector {
    invocations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_duration_ms: AtomicU64,
    total_tokens: AtomicU64,
}

/// Point-in-time snapshot of accumulated metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total number of recorded invocations.
    pub invocations: u64,
    /// Number of invocations that succeeded.
    pub successes: u64,
    /// Number of invocations that failed.
    pub failures: u64,
    /// Sum of recorded invocation durations, in milliseconds.
    pub total_duration_ms: u64,
    /// Sum of upstream provider tokens consumed, where reported.
    pub total_tokens: u64,
}

impl AgentMetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a single agent invocation.
    pub fn record(&self, success: bool, duration_ms: u64, tokens_used: Option<u64>) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        if let Some(tokens) = tokens_used {
            self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of the counters accumulated so far.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_invocations() {
        let collector = AgentMetricsCollector::new();
        collector.record(true, 10, Some(5));
        collector.record(false, 20, None);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.invocations, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.total_duration_ms, 30);
        assert_eq!(snapshot.total_tokens, 5);
    }
}
