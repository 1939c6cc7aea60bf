//! The agent handler contract: the unit of behavior an orchestrator invokes.

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use crate::event::{AgentResult, Chunk, Event, State};

/// Deadline-bearing execution context passed as the first parameter to every
/// handler and hook invocation, per the runtime's uniform calling convention.
#[derive(Clone, Debug)]
pub struct Context {
    deadline: Option<Instant>,
    session_id: String,
}

impl Context {
    /// Creates a context with no deadline.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            deadline: None,
            session_id: session_id.into(),
        }
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(session_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            session_id: session_id.into(),
        }
    }

    /// Returns the session identifier this context belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the absolute deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the duration remaining before the deadline, or `None` if unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Derives a tighter context for a sub-operation bounded by `timeout`,
    /// never extending beyond this context's own deadline.
    #[must_use]
    pub fn narrowed(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(candidate)),
            None => Some(candidate),
        };
        Self {
            deadline,
            session_id: self.session_id.clone(),
        }
    }
}

/// Errors surfaced directly by a handler's execution envelope, distinct from
/// the handler's own business-logic failures (which are encoded in
/// [`AgentResult::error`]).
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The context's deadline elapsed before the handler completed.
    #[error("handler execution timed out")]
    Timeout,
    /// The handler task panicked.
    #[error("handler panicked: {reason}")]
    Panicked {
        /// Captured panic payload, converted to a string where possible.
        reason: String,
    },
}

/// Result alias for handler execution envelopes.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// A stream of chunks produced by a streaming handler invocation.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Chunk> + Send>>;

/// Non-streaming and streaming behavior implemented by an agent.
///
/// Implementations must never mutate the `state` passed to `run`; the
/// returned [`AgentResult::output_state`] is expected to be a clone with the
/// handler's own changes applied, populating the conventional output keys
/// (`response`, `output`, `message`, `result`, `content`) where applicable.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Executes the agent against a single event and input state.
    async fn run(&self, ctx: &Context, event: &Event, state: &State) -> AgentResult;

    /// Executes the agent, yielding a stream of chunks as output becomes
    /// available. The default implementation runs `run` to completion and
    /// emits its final output as a single `Text` chunk followed by `Done`, so
    /// handlers that have no genuine incremental output need not implement
    /// this themselves.
    async fn run_stream(&self, ctx: &Context, event: &Event, state: &State) -> StreamHandle {
        let result = self.run(ctx, event, state).await;
        let is_success = result.is_success();
        let output = result
            .output_state()
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned();

        let chunks: Vec<Chunk> = if is_success {
            vec![Chunk::text(output), Chunk::done()]
        } else {
            vec![Chunk::error(result.error().to_owned())]
        };

        StreamHandle::from_chunks(chunks, result)
    }
}

/// Handle returned by [`AgentHandler::run_stream`]: a chunk stream plus the
/// eventual final result.
pub struct StreamHandle {
    stream: ChunkStream,
    result: tokio::sync::oneshot::Receiver<AgentResult>,
}

impl StreamHandle {
    /// Constructs a handle from an explicit chunk stream and a channel that
    /// will yield the final result once the stream is exhausted.
    #[must_use]
    pub fn new(stream: ChunkStream, result: tokio::sync::oneshot::Receiver<AgentResult>) -> Self {
        Self { stream, result }
    }

    /// Constructs a handle from a fixed, already-computed sequence of chunks.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Chunk>, result: AgentResult) -> Self {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _ = tx.send(result);
        Self {
            stream: Box::pin(futures::stream::iter(chunks)),
            result: rx,
        }
    }

    /// Returns the chunk stream, consuming the handle's stream half.
    pub fn chunks(&mut self) -> &mut ChunkStream {
        &mut self.stream
    }

    /// Awaits the final [`AgentResult`] once streaming has completed.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Panicked`] if the producing task was dropped
    /// before sending a result.
    pub async fn wait(self) -> HandlerResult<AgentResult> {
        self.result.await.map_err(|_| HandlerError::Panicked {
            reason: "stream producer dropped before completion".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct Echo;

    #[async_trait]
    impl AgentHandler for Echo {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            let mut output = state.clone();
            output.set("response", serde_json::Value::from("echoed"));
            AgentResult::success(output)
        }
    }

    #[tokio::test]
    async fn default_stream_emits_text_then_done() {
        let handler = Echo;
        let ctx = Context::new("session-1");
        let event = Event::new(Default::default(), Default::default());
        let state = State::new();

        let mut handle = handler.run_stream(&ctx, &event, &state).await;
        let chunks: Vec<Chunk> = handle.chunks().by_ref().collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content(), Some("echoed"));
        assert!(chunks[1].is_terminal());

        let result = handle.wait().await.unwrap();
        assert!(result.is_success());
    }

    #[test]
    fn narrowed_context_never_extends_deadline() {
        let ctx = Context::with_timeout("session", Duration::from_millis(50));
        let narrowed = ctx.narrowed(Duration::from_secs(10));
        assert!(narrowed.deadline().unwrap() <= ctx.deadline().unwrap());
    }

    #[test]
    fn unbounded_context_adopts_narrowed_timeout() {
        let ctx = Context::new("session");
        let narrowed = ctx.narrowed(Duration::from_millis(10));
        assert!(narrowed.deadline().is_some());
    }
}
