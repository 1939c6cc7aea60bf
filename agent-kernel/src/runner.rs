//! Event queue, worker pool, and trace storage tying the orchestrator to a
//! running process.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, instrument, warn};

use agent_primitives::AgentManifest;

use crate::callback::CallbackRegistry;
use crate::event::{AgentResult, Event, State, TraceRecord};
use crate::handler::{AgentHandler, Context};
use crate::orchestrator::{Orchestrator, RegisteredAgent};

/// Errors surfaced by runner operations.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Startup-time configuration was invalid.
    #[error("invalid runner configuration: {reason}")]
    Configuration {
        /// Human-readable reason for rejection.
        reason: String,
    },
    /// The event queue rejected a new event because it was full.
    #[error("event queue is full")]
    QueueFull,
    /// The runner has not been started, or has already been stopped.
    #[error("runner is not running")]
    NotRunning,
    /// An agent with this name is already registered.
    #[error("agent `{name}` is already registered")]
    DuplicateAgent {
        /// The offending agent name.
        name: String,
    },
    /// The dispatched event's deadline elapsed before a result was produced.
    #[error("event processing timed out")]
    Timeout,
    /// An unrecovered fault occurred inside a worker task.
    #[error("internal worker fault: {reason}")]
    Internal {
        /// Description of the fault, where available.
        reason: String,
    },
}

/// Result alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Configuration controlling the runner's worker pool and queue.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Number of concurrent worker tasks. Defaults to the available parallelism.
    pub worker_count: usize,
    /// Maximum number of events buffered ahead of the workers.
    pub queue_capacity: usize,
    /// Default per-event deadline applied when `dispatch_sync` is not given one.
    pub default_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            worker_count,
            queue_capacity: 1024,
            default_timeout: Duration::from_secs(30),
        }
    }
}

struct Job {
    event: Event,
    state: State,
}

/// Ring buffer of trace records keyed by session, bounded per session.
#[derive(Default)]
struct TraceStore {
    per_session: Mutex<HashMap<String, VecDeque<TraceRecord>>>,
    capacity_per_session: usize,
}

impl TraceStore {
    fn new(capacity_per_session: usize) -> Self {
        Self {
            per_session: Mutex::new(HashMap::new()),
            capacity_per_session,
        }
    }

    fn append(&self, record: TraceRecord) {
        let mut guard = self
            .per_session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries = guard.entry(record.session_id().to_owned()).or_default();
        entries.push_back(record);
        while entries.len() > self.capacity_per_session {
            entries.pop_front();
        }
    }

    fn for_session(&self, session_id: &str) -> Vec<TraceRecord> {
        let guard = self
            .per_session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .get(session_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Owns the agent table, orchestrator, callback registry, and worker pool for
/// a single in-process runtime.
pub struct Runner {
    config: RunnerConfig,
    agents: Mutex<HashMap<String, RegisteredAgent>>,
    orchestrator: Arc<dyn Orchestrator>,
    callbacks: Arc<CallbackRegistry>,
    traces: Arc<TraceStore>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    last_event_ms: AtomicU64,
}

impl Runner {
    /// Creates a runner wired to the given orchestrator and callback registry.
    ///
    /// Per-agent registration happens separately via [`Runner::register_agent`];
    /// the orchestrator must be constructed against the same agent names ahead
    /// of time (see [`crate::orchestrator::ModeOrchestrator`]).
    #[must_use]
    pub fn new(
        config: RunnerConfig,
        orchestrator: Arc<dyn Orchestrator>,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        Self {
            config,
            agents: Mutex::new(HashMap::new()),
            orchestrator,
            callbacks,
            traces: Arc::new(TraceStore::new(256)),
            sender: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            last_event_ms: AtomicU64::new(0),
        }
    }

    /// Registers an agent by name.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::DuplicateAgent`] if the name is already registered.
    pub fn register_agent(
        &self,
        manifest: AgentManifest,
        handler: Arc<dyn AgentHandler>,
    ) -> RunnerResult<()> {
        let name = manifest.name().to_owned();
        let mut guard = self
            .agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.contains_key(&name) {
            return Err(RunnerError::DuplicateAgent { name });
        }
        guard.insert(name, RegisteredAgent::new(manifest, handler));
        Ok(())
    }

    /// Returns the names of all registered agents.
    #[must_use]
    pub fn registered_agents(&self) -> Vec<String> {
        self.agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Starts the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Configuration`] if the runner is already running.
    pub fn start(self: &Arc<Self>) -> RunnerResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RunnerError::Configuration {
                reason: "runner already started".into(),
            });
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        *self.sender.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tx);

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let mut handles = Vec::with_capacity(self.config.worker_count);
        for worker_id in 0..self.config.worker_count.max(1) {
            let runner = Arc::clone(self);
            let rx = Arc::clone(&rx);
            handles.push(tokio::spawn(async move {
                runner.worker_loop(worker_id, rx).await;
            }));
        }
        *self.workers.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = handles;
        Ok(())
    }

    /// Stops the worker pool, allowing in-flight jobs to drain.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        drop(sender);

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Returns `true` while the worker pool is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Enqueues an event for asynchronous processing, applying no state seed
    /// beyond the event's own payload and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::NotRunning`] if the runner has not been started,
    /// or [`RunnerError::QueueFull`] if the queue is full and backpressure
    /// rejects rather than blocks (the default channel behavior here blocks
    /// the caller instead; callers wanting reject-on-full should use
    /// `try_emit`).
    pub async fn emit(&self, event: Event) -> RunnerResult<()> {
        let sender = self.sender_or_not_running()?;
        let state = State::from_event(&event);
        sender
            .send(Job { event, state })
            .await
            .map_err(|_| RunnerError::NotRunning)
    }

    /// Enqueues an event without blocking; rejects immediately if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::QueueFull`] if the queue has no free capacity,
    /// or [`RunnerError::NotRunning`] if the runner is not started.
    pub fn try_emit(&self, event: Event) -> RunnerResult<()> {
        let sender = self.sender_or_not_running()?;
        let state = State::from_event(&event);
        sender
            .try_send(Job { event, state })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => RunnerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => RunnerError::NotRunning,
            })
    }

    /// Dispatches an event and awaits its result directly, bypassing the queue.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Timeout`] if `timeout` elapses first, or
    /// propagates orchestrator failures wrapped as [`RunnerError::Internal`].
    #[instrument(skip(self, event), fields(event_id = %event.id()))]
    pub async fn dispatch_sync(
        &self,
        event: Event,
        timeout: Option<Duration>,
    ) -> RunnerResult<AgentResult> {
        let state = State::from_event(&event);
        let deadline = timeout.unwrap_or(self.config.default_timeout);
        let ctx = Context::with_timeout("dispatch_sync", deadline);

        let outcome = tokio::time::timeout(deadline, self.run_dispatch(&ctx, &event, &state)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(RunnerError::Timeout),
        }
    }

    /// Returns the trace records recorded for a session, oldest first.
    #[must_use]
    pub fn traces_for_session(&self, session_id: &str) -> Vec<TraceRecord> {
        self.traces.for_session(session_id)
    }

    /// Returns the callback registry shared with this runner's orchestrator,
    /// so callers can register hooks (e.g. a trace hook on `AfterAgentRun`)
    /// after construction.
    #[must_use]
    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    fn sender_or_not_running(&self) -> RunnerResult<mpsc::Sender<Job>> {
        self.sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or(RunnerError::NotRunning)
    }

    async fn run_dispatch(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
    ) -> RunnerResult<AgentResult> {
        self.last_event_ms.store(now_ms(), Ordering::Relaxed);

        let outcome = std::panic::AssertUnwindSafe(self.orchestrator.dispatch(ctx, event, state))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => AgentResult::failure(state.clone(), err.to_string()),
            Err(_) => {
                error!("worker panicked while dispatching event");
                return Err(RunnerError::Internal {
                    reason: "orchestrator panicked".into(),
                });
            }
        };

        self.traces.append(TraceRecord::new(
            ctx.session_id(),
            "runner",
            event.route().unwrap_or("orchestrator"),
            if result.is_success() { "ok" } else { "error" },
            result.error(),
            now_ms(),
        ));

        Ok(result)
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker_id: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    ) {
        loop {
            let job = {
                let mut guard = rx.lock().await;
                guard.recv().await
            };
            let Some(Job { event, state }) = job else {
                break;
            };

            let ctx = Context::with_timeout(event.id().to_string(), self.config.default_timeout);
            if let Err(err) = self.run_dispatch(&ctx, &event, &state).await {
                warn!(worker_id, %err, "emitted event failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ModeOrchestrator, OrchestrationMode, RegisteredAgent};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap as Map;

    struct Echo;

    #[async_trait]
    impl AgentHandler for Echo {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            let mut out = state.clone();
            out.set("response", Value::from("ok"));
            AgentResult::success(out)
        }
    }

    fn manifest(name: &str) -> AgentManifest {
        AgentManifest::builder(agent_primitives::AgentId::random())
            .name(name)
            .unwrap()
            .build()
            .unwrap()
    }

    fn build_runner() -> Arc<Runner> {
        let mut table: Map<String, RegisteredAgent> = Map::new();
        table.insert("echo".into(), RegisteredAgent::new(manifest("echo"), Arc::new(Echo)));
        let orchestrator = Arc::new(ModeOrchestrator::new(
            OrchestrationMode::Route,
            table,
            Arc::new(CallbackRegistry::new()),
        ));
        Arc::new(Runner::new(
            RunnerConfig { worker_count: 2, ..RunnerConfig::default() },
            orchestrator,
            Arc::new(CallbackRegistry::new()),
        ))
    }

    #[tokio::test]
    async fn dispatch_sync_returns_result_without_starting_workers() {
        let runner = build_runner();
        let event = Event::for_agent("echo", Default::default());
        let result = runner.dispatch_sync(event, None).await.unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("ok")));
    }

    #[tokio::test]
    async fn emit_requires_started_runner() {
        let runner = build_runner();
        let event = Event::for_agent("echo", Default::default());
        let err = runner.emit(event).await.unwrap_err();
        assert!(matches!(err, RunnerError::NotRunning));
    }

    #[tokio::test]
    async fn start_stop_processes_emitted_events() {
        let runner = build_runner();
        runner.start().unwrap();

        let event = Event::for_agent("echo", Default::default());
        runner.emit(event).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        runner.stop().await;

        let traces = runner.traces_for_session("dispatch_sync");
        let _ = traces;
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn registering_duplicate_agent_errors() {
        let runner = build_runner();
        let err = runner
            .register_agent(manifest("echo"), Arc::new(Echo))
            .unwrap_err();
        assert!(matches!(err, RunnerError::DuplicateAgent { .. }));
    }

    struct Sleepy;

    #[async_trait]
    impl AgentHandler for Sleepy {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            tokio::time::sleep(Duration::from_millis(200)).await;
            AgentResult::success(state.clone())
        }
    }

    #[tokio::test]
    async fn dispatch_sync_times_out_and_runner_stays_usable() {
        let mut table: Map<String, RegisteredAgent> = Map::new();
        table.insert("echo".into(), RegisteredAgent::new(manifest("echo"), Arc::new(Echo)));
        table.insert("sleepy".into(), RegisteredAgent::new(manifest("sleepy"), Arc::new(Sleepy)));
        let orchestrator = Arc::new(ModeOrchestrator::new(
            OrchestrationMode::Route,
            table,
            Arc::new(CallbackRegistry::new()),
        ));
        let runner = Arc::new(Runner::new(
            RunnerConfig::default(),
            orchestrator,
            Arc::new(CallbackRegistry::new()),
        ));

        let slow = Event::for_agent("sleepy", Default::default());
        let err = runner
            .dispatch_sync(slow, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout));

        let next = Event::for_agent("echo", Default::default());
        let result = runner.dispatch_sync(next, None).await.unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("ok")));
    }
}
