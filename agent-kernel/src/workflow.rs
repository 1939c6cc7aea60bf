//! Named, ordered agent chains with aggregate and streaming execution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

use crate::event::{AgentResult, Chunk, ChunkKind, Event, State};
use crate::handler::{AgentHandler, ChunkStream, Context};

/// A transform applied to a step's textual input before invoking its agent.
pub type StepTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A single named stage in a [`Workflow`].
pub struct Step {
    name: String,
    agent: Arc<dyn AgentHandler>,
    transform: StepTransform,
    timeout: Option<Duration>,
}

impl Step {
    /// Creates a step that passes its input through unchanged.
    #[must_use]
    pub fn new(name: impl Into<String>, agent: Arc<dyn AgentHandler>) -> Self {
        Self {
            name: name.into(),
            agent,
            transform: Arc::new(|input: &str| input.to_owned()),
            timeout: None,
        }
    }

    /// Sets the input transform applied before invoking the step's agent.
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    /// Sets a per-step execution deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the step's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Errors produced while executing a single step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step's agent reported a failure.
    #[error("step `{step}` failed: {reason}")]
    Failed {
        /// Name of the failing step.
        step: String,
        /// Failure reason reported by the agent.
        reason: String,
    },
}

/// Errors produced while running a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A step failed; the workflow aborts on the first such failure.
    #[error(transparent)]
    Step(#[from] StepError),
    /// The workflow's own deadline is shorter than the sum of its steps'
    /// declared timeouts, which would make some steps unreachable.
    #[error(
        "workflow timeout {workflow_timeout:?} is shorter than the sum of step timeouts {step_timeout_sum:?}"
    )]
    TimeoutTooShort {
        /// The timeout configured for the overall workflow run.
        workflow_timeout: Duration,
        /// The sum of all per-step timeouts.
        step_timeout_sum: Duration,
    },
}

/// Result alias for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

fn response_text(state: &State) -> String {
    state
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned()
}

/// A named, ordered chain of steps executed one after another, each step's
/// transformed output feeding the next.
pub struct Workflow {
    name: String,
    steps: Vec<Step>,
}

impl Workflow {
    /// Creates a workflow from an ordered list of steps.
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self { name: name.into(), steps }
    }

    /// Returns the workflow's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates that `workflow_timeout`, if given, covers the sum of all
    /// per-step timeouts (steps without one are not counted, since they
    /// inherit the remaining workflow budget rather than adding a fixed cost).
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::TimeoutTooShort`] when the declared workflow
    /// timeout cannot possibly accommodate every step's own timeout.
    pub fn validate_timeout(&self, workflow_timeout: Option<Duration>) -> WorkflowResult<()> {
        let Some(workflow_timeout) = workflow_timeout else {
            return Ok(());
        };
        let step_timeout_sum: Duration = self.steps.iter().filter_map(|s| s.timeout).sum();
        if step_timeout_sum > workflow_timeout {
            return Err(WorkflowError::TimeoutTooShort {
                workflow_timeout,
                step_timeout_sum,
            });
        }
        Ok(())
    }

    /// Runs the workflow to completion, aborting on the first step failure.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Step`] if any step's agent reports failure.
    #[instrument(skip(self, ctx, input), fields(workflow = %self.name))]
    pub async fn run(&self, ctx: &Context, input: &str) -> WorkflowResult<AgentResult> {
        let mut current = input.to_owned();
        let mut state = State::new();
        for step in &self.steps {
            let transformed = (step.transform)(&current);
            let event = Event::for_agent(step.name.clone(), Default::default());
            let mut step_state = state.clone();
            step_state.set("input", serde_json::Value::from(transformed));

            let step_ctx = match step.timeout {
                Some(timeout) => ctx.narrowed(timeout),
                None => ctx.clone(),
            };

            let result = step.agent.run(&step_ctx, &event, &step_state).await;
            if !result.is_success() {
                return Err(StepError::Failed {
                    step: step.name.clone(),
                    reason: result.error().to_owned(),
                }
                .into());
            }
            state = result.into_output_state();
            current = response_text(&state);
        }
        Ok(AgentResult::success(state))
    }

    /// Runs the workflow, streaming a metadata chunk at each step boundary,
    /// forwarding that step's own chunks tagged with a `step_name` metadata
    /// entry, and terminating with exactly one final `Done` chunk (or an
    /// `Error` chunk on the first failure).
    pub fn run_stream(self: Arc<Self>, ctx: Context, input: String) -> ChunkStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let writer = ChunkWriter::new(tx);
            let mut current = input;
            let mut state = State::new();

            for step in &self.steps {
                writer.send(
                    Chunk::metadata(Default::default()).with_metadata("step_name", step.name.clone()),
                );

                let transformed = (step.transform)(&current);
                let event = Event::for_agent(step.name.clone(), Default::default());
                let mut step_state = state.clone();
                step_state.set("input", serde_json::Value::from(transformed));

                let step_ctx = match step.timeout {
                    Some(timeout) => ctx.narrowed(timeout),
                    None => ctx.clone(),
                };

                let mut handle = step.agent.run_stream(&step_ctx, &event, &step_state).await;
                {
                    use futures::StreamExt;
                    let stream = handle.chunks();
                    while let Some(chunk) = stream.next().await {
                        if chunk.is_terminal() {
                            break;
                        }
                        writer.send(chunk.with_metadata("step_name", step.name.clone()));
                    }
                }

                let result = match handle.wait().await {
                    Ok(result) => result,
                    Err(err) => {
                        writer.finish_error(err.to_string());
                        return;
                    }
                };

                if !result.is_success() {
                    writer.finish_error(result.error().to_owned());
                    return;
                }

                state = result.into_output_state();
                current = response_text(&state);
            }

            writer.finish_done();
        });

        Box::pin(UnboundedReceiverStream(rx))
    }
}

/// Write-once wrapper around the stream's sender half: after `Done` or
/// `Error` is sent, further sends are silently dropped, and the underlying
/// channel is only ever closed by dropping the sender exactly once.
struct ChunkWriter {
    tx: tokio::sync::mpsc::UnboundedSender<Chunk>,
    closed: std::sync::atomic::AtomicBool,
}

impl ChunkWriter {
    fn new(tx: tokio::sync::mpsc::UnboundedSender<Chunk>) -> Self {
        Self { tx, closed: std::sync::atomic::AtomicBool::new(false) }
    }

    fn send(&self, chunk: Chunk) {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(chunk);
    }

    fn finish_done(&self) {
        if self.closed.swap(true, std::sync::atomic::Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Chunk::done());
    }

    fn finish_error(&self, reason: impl Into<String>) {
        if self.closed.swap(true, std::sync::atomic::Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Chunk::error(reason.into()));
    }
}

struct UnboundedReceiverStream(tokio::sync::mpsc::UnboundedReceiver<Chunk>);

impl futures::Stream for UnboundedReceiverStream {
    type Item = Chunk;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Chunk>> {
        self.0.poll_recv(cx)
    }
}

/// Executes several named workflows concurrently over the same input,
/// applying Collaborative semantics (independent state, aggregated results)
/// across their merged output streams.
pub struct ParallelWorkflow {
    workflows: Vec<Arc<Workflow>>,
}

impl ParallelWorkflow {
    /// Creates a parallel workflow set.
    #[must_use]
    pub fn new(workflows: Vec<Arc<Workflow>>) -> Self {
        Self { workflows }
    }

    /// Runs all member workflows concurrently, returning one aggregate result
    /// keyed by workflow name, analogous to Collaborative mode's `results` key.
    pub async fn run(&self, ctx: &Context, input: &str) -> AgentResult {
        let futures = self.workflows.iter().map(|workflow| async move {
            let outcome = workflow.run(ctx, input).await;
            (workflow.name().to_owned(), outcome)
        });
        let outcomes = futures::future::join_all(futures).await;

        let mut state = State::new();
        let mut results = Vec::with_capacity(outcomes.len());
        for (name, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    results.push(serde_json::json!({ "workflow": name, "success": true }));
                    state.set(name, serde_json::Value::Object(
                        result
                            .output_state()
                            .data()
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ));
                }
                Err(err) => {
                    results.push(serde_json::json!({
                        "workflow": name,
                        "success": false,
                        "error": err.to_string(),
                    }));
                }
            }
        }
        state.set("results", serde_json::Value::Array(results));
        AgentResult::success(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::Value;

    struct Upper;

    #[async_trait]
    impl AgentHandler for Upper {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            let input = state.get("input").and_then(Value::as_str).unwrap_or("").to_uppercase();
            let mut out = state.clone();
            out.set("response", Value::from(input));
            AgentResult::success(out)
        }
    }

    struct Failing;

    #[async_trait]
    impl AgentHandler for Failing {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            AgentResult::failure(state.clone(), "step exploded")
        }
    }

    #[tokio::test]
    async fn runs_steps_in_order() {
        let workflow = Workflow::new(
            "pipeline",
            vec![
                Step::new("shout", Arc::new(Upper)),
                Step::new("shout-again", Arc::new(Upper)),
            ],
        );
        let result = workflow.run(&Context::new("s1"), "hello").await.unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("HELLO")));
    }

    #[tokio::test]
    async fn aborts_on_first_failure() {
        let workflow = Workflow::new(
            "pipeline",
            vec![Step::new("broken", Arc::new(Failing)), Step::new("never", Arc::new(Upper))],
        );
        let err = workflow.run(&Context::new("s1"), "hello").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Step(StepError::Failed { .. })));
    }

    #[tokio::test]
    async fn stream_emits_step_metadata_and_single_done() {
        let workflow = Arc::new(Workflow::new(
            "pipeline",
            vec![Step::new("shout", Arc::new(Upper))],
        ));
        let mut stream = workflow.run_stream(Context::new("s1"), "hi".into());

        let mut saw_metadata = false;
        let mut done_count = 0;
        while let Some(chunk) = stream.next().await {
            if chunk.kind() == ChunkKind::Metadata {
                saw_metadata = true;
            }
            if chunk.kind() == ChunkKind::Done {
                done_count += 1;
            }
        }
        assert!(saw_metadata);
        assert_eq!(done_count, 1);
    }

    #[tokio::test]
    async fn stream_emits_single_error_on_failure() {
        let workflow = Arc::new(Workflow::new(
            "pipeline",
            vec![Step::new("broken", Arc::new(Failing))],
        ));
        let mut stream = workflow.run_stream(Context::new("s1"), "hi".into());

        let mut error_count = 0;
        let mut done_count = 0;
        while let Some(chunk) = stream.next().await {
            match chunk.kind() {
                ChunkKind::Error => error_count += 1,
                ChunkKind::Done => done_count += 1,
                _ => {}
            }
        }
        assert_eq!(error_count, 1);
        assert_eq!(done_count, 0);
    }

    #[test]
    fn validate_timeout_rejects_too_short_budget() {
        let workflow = Workflow::new(
            "pipeline",
            vec![
                Step::new("a", Arc::new(Upper)).with_timeout(Duration::from_secs(10)),
                Step::new("b", Arc::new(Upper)).with_timeout(Duration::from_secs(10)),
            ],
        );
        let err = workflow
            .validate_timeout(Some(Duration::from_secs(5)))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::TimeoutTooShort { .. }));
    }

    #[tokio::test]
    async fn parallel_workflow_aggregates_by_name() {
        let a = Arc::new(Workflow::new("a", vec![Step::new("shout", Arc::new(Upper))]));
        let b = Arc::new(Workflow::new("b", vec![Step::new("shout", Arc::new(Upper))]));
        let parallel = ParallelWorkflow::new(vec![a, b]);
        let result = parallel.run(&Context::new("s1"), "hi").await;
        assert!(result.output_state().get("a").is_some());
        assert!(result.output_state().get("b").is_some());
    }
}
