//! Event, state, and result types passed between the runner, orchestrator, and
//! agent handlers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata key that the Route orchestrator reads to select a target agent.
pub const ROUTE_METADATA_KEY: &str = "route";

/// A unit of work dispatched into the runner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    payload: HashMap<String, Value>,
    metadata: HashMap<String, String>,
}

impl Event {
    /// Creates a new event with a random identifier.
    #[must_use]
    pub fn new(payload: HashMap<String, Value>, metadata: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            metadata,
        }
    }

    /// Creates an event addressed to a specific agent via the `route` metadata key.
    #[must_use]
    pub fn for_agent(agent_name: impl Into<String>, payload: HashMap<String, Value>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(ROUTE_METADATA_KEY.to_owned(), agent_name.into());
        Self::new(payload, metadata)
    }

    /// Returns the event identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the event payload.
    #[must_use]
    pub fn payload(&self) -> &HashMap<String, Value> {
        &self.payload
    }

    /// Returns the event metadata.
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Returns the agent name declared by the reserved `route` metadata key, if any.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.metadata.get(ROUTE_METADATA_KEY).map(String::as_str)
    }

    /// Sets a metadata entry, returning the previous value if present.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.metadata.insert(key.into(), value.into())
    }
}

/// Mutable key/value working set threaded through an orchestration run.
///
/// Cloning a `State` always produces an independent copy: mutating the clone
/// never affects the original, and vice versa.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct State {
    data: HashMap<String, Value>,
    meta: HashMap<String, String>,
}

impl State {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state seeded from an event's payload and metadata.
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        Self {
            data: event.payload().clone(),
            meta: event.metadata().clone(),
        }
    }

    /// Reads a data value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Sets a data value, returning the previous value if present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Removes a data value, returning it if present.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Returns a reference to the full data map.
    #[must_use]
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// Returns a mutable reference to the full data map.
    pub fn data_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.data
    }

    /// Returns a reference to the metadata map.
    #[must_use]
    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    /// Returns a mutable reference to the metadata map.
    pub fn meta_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.meta
    }

    /// Merges `other` into `self`, with `other`'s entries taking precedence on conflict.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.data {
            self.data.insert(key.clone(), value.clone());
        }
        for (key, value) in &other.meta {
            self.meta.insert(key.clone(), value.clone());
        }
    }
}

/// Optional per-invocation execution metrics an agent may report.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Wall-clock duration of the invocation, in milliseconds.
    pub duration_ms: u64,
    /// Upstream provider token usage, if applicable.
    pub tokens_used: Option<u64>,
    /// Number of retry attempts consumed.
    pub retries: u32,
}

/// Outcome of invoking a single agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentResult {
    output_state: State,
    error: String,
    metrics: Option<AgentMetrics>,
}

impl AgentResult {
    /// Creates a successful result with the given output state.
    #[must_use]
    pub fn success(output_state: State) -> Self {
        Self {
            output_state,
            error: String::new(),
            metrics: None,
        }
    }

    /// Creates a failed result carrying a human-readable error message.
    #[must_use]
    pub fn failure(output_state: State, error: impl Into<String>) -> Self {
        Self {
            output_state,
            error: error.into(),
            metrics: None,
        }
    }

    /// Attaches execution metrics and returns the updated result.
    #[must_use]
    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether the invocation succeeded (the error string is empty).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Returns the resulting output state.
    #[must_use]
    pub fn output_state(&self) -> &State {
        &self.output_state
    }

    /// Consumes the result, returning the output state.
    #[must_use]
    pub fn into_output_state(self) -> State {
        self.output_state
    }

    /// Returns the error message, empty on success.
    #[must_use]
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Returns the reported metrics, if any.
    #[must_use]
    pub fn metrics(&self) -> Option<&AgentMetrics> {
        self.metrics.as_ref()
    }
}

/// Discriminates the kind of content carried by a [`StreamChunk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Out-of-band metadata describing the stream (e.g. step boundaries).
    Metadata,
    /// A complete piece of text.
    Text,
    /// An incremental text delta.
    Delta,
    /// A reasoning/"thinking" fragment, not part of the final answer.
    Thought,
    /// A tool invocation request surfaced to the caller.
    ToolCall,
    /// Terminal chunk signaling successful completion. Emitted exactly once, last.
    Done,
    /// Terminal chunk signaling failure. Emitted exactly once, last.
    Error,
}

/// A single unit emitted by a streaming agent or workflow run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Chunk {
    /// Builds a text chunk.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Text,
            content: Some(content.into()),
            delta: None,
            metadata: HashMap::new(),
            error: None,
        }
    }

    /// Builds a delta chunk.
    #[must_use]
    pub fn delta(delta: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Delta,
            content: None,
            delta: Some(delta.into()),
            metadata: HashMap::new(),
            error: None,
        }
    }

    /// Builds a thought chunk.
    #[must_use]
    pub fn thought(content: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Thought,
            content: Some(content.into()),
            delta: None,
            metadata: HashMap::new(),
            error: None,
        }
    }

    /// Builds a metadata-only chunk.
    #[must_use]
    pub fn metadata(metadata: HashMap<String, String>) -> Self {
        Self {
            kind: ChunkKind::Metadata,
            content: None,
            delta: None,
            metadata,
            error: None,
        }
    }

    /// Builds the terminal success chunk.
    #[must_use]
    pub fn done() -> Self {
        Self {
            kind: ChunkKind::Done,
            content: None,
            delta: None,
            metadata: HashMap::new(),
            error: None,
        }
    }

    /// Builds the terminal error chunk.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Error,
            content: None,
            delta: None,
            metadata: HashMap::new(),
            error: Some(error.into()),
        }
    }

    /// Attaches a metadata entry, e.g. `step_name`, and returns the updated chunk.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the chunk's kind.
    #[must_use]
    pub const fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// Returns `true` if this chunk terminates the stream (`Done` or `Error`).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ChunkKind::Done | ChunkKind::Error)
    }

    /// Returns the full-content payload, if present.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Returns the delta payload, if present.
    #[must_use]
    pub fn delta_text(&self) -> Option<&str> {
        self.delta.as_deref()
    }

    /// Returns the chunk metadata.
    #[must_use]
    pub fn metadata_map(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Returns the error message carried by an `Error` chunk.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Append-only record of a single agent invocation within a session, used by
/// the trace hook and replay tooling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceRecord {
    session_id: String,
    from: String,
    to: String,
    result_summary: String,
    content: String,
    timestamp_ms: u64,
}

impl TraceRecord {
    /// Creates a new trace record.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        result_summary: impl Into<String>,
        content: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            from: from.into(),
            to: to.into(),
            result_summary: result_summary.into(),
            content: content.into(),
            timestamp_ms,
        }
    }

    /// Returns the session identifier this record belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the originating agent or component name.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Returns the destination agent or component name.
    #[must_use]
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Returns a short human-readable summary of the result.
    #[must_use]
    pub fn result_summary(&self) -> &str {
        &self.result_summary
    }

    /// Returns the full recorded content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the record's timestamp in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}
