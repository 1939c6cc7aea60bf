//! Deterministic replay of recorded events for debugging.

use serde::{Deserialize, Serialize};

/// A single recorded step suitable for replay or diffing against a live run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayRecord {
    sequence: u64,
    session_id: String,
    label: String,
    payload: String,
}

impl ReplayRecord {
    /// Creates a record identified by its replay `sequence` number.
    #[must_use]
    pub fn new(
        sequence: u64,
        session_id: impl Into<String>,
        label: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            session_id: session_id.into(),
            label: label.into(),
            payload: payload.into(),
        }
    }

    /// Returns the replay sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the originating session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the step label (e.g. an agent or hook name).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the recorded payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Replays `records` in sequence order, invoking `visit` once per record.
///
/// Callers may submit records in arrival order; replay always proceeds by
/// ascending [`ReplayRecord::sequence`].
pub fn replay(mut records: Vec<ReplayRecord>, mut visit: impl FnMut(&ReplayRecord)) {
    records.sort_by_key(ReplayRecord::sequence);
    for record in &records {
        visit(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_visits_in_sequence_order() {
        let records = vec![
            ReplayRecord::new(2, "s1", "after", "b"),
            ReplayRecord::new(1, "s1", "before", "a"),
        ];

        let mut seen = Vec::new();
        replay(records, |record| seen.push(record.label().to_owned()));

        assert_eq!(seen, vec!["before", "after"]);
    }
}
