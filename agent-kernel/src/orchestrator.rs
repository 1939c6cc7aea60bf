//! Orchestrator composition modes: Route, Sequential, Collaborative, Loop, and Mixed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use agent_primitives::registry::{FactoryRegistry, RegistryError};
use agent_primitives::AgentManifest;

use crate::callback::{invoke_best_effort, CallbackArgs, CallbackRegistry, HookPoint};
use crate::event::{AgentResult, Event, State};
use crate::handler::{AgentHandler, Context};

/// Errors an orchestrator may surface to the runner.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The event carried no usable `route` metadata and no error handler was registered.
    #[error("no route found for event and no error handler configured")]
    NoRoute,
    /// The event's `route` metadata named an agent that was never registered.
    #[error("agent `{name}` is not registered")]
    UnknownAgent {
        /// The unresolved agent name.
        name: String,
    },
    /// An agent invocation failed and `continue_on_error` was not set.
    #[error("agent `{agent}` failed: {reason}")]
    AgentFailed {
        /// The agent that failed.
        agent: String,
        /// The failure reason reported by the agent.
        reason: String,
    },
    /// Collaborative mode's failure threshold was exceeded.
    #[error("collaborative run failed: {succeeded}/{total} succeeded, below threshold {threshold}")]
    FailureThresholdExceeded {
        /// Agents that completed successfully.
        succeeded: usize,
        /// Total agents invoked.
        total: usize,
        /// Configured minimum success fraction.
        threshold: f64,
    },
    /// Registry lookup/construction failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The orchestration mode is contradictory or references agents that
    /// cannot be scheduled; caught at construction rather than at dispatch.
    #[error("invalid orchestration configuration: {reason}")]
    Configuration {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// Result alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// A named, registered agent: its manifest plus the handler that executes it.
#[derive(Clone)]
pub struct RegisteredAgent {
    manifest: AgentManifest,
    handler: Arc<dyn AgentHandler>,
}

impl RegisteredAgent {
    /// Pairs a manifest with its handler implementation.
    #[must_use]
    pub fn new(manifest: AgentManifest, handler: Arc<dyn AgentHandler>) -> Self {
        Self { manifest, handler }
    }

    /// Returns the agent's manifest.
    #[must_use]
    pub fn manifest(&self) -> &AgentManifest {
        &self.manifest
    }

    /// Returns the agent's handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn AgentHandler> {
        &self.handler
    }
}

/// Composition mode governing how an orchestrator dispatches events to agents.
#[derive(Clone, Debug)]
pub enum OrchestrationMode {
    /// Dynamic dispatch via `event.metadata["route"]`.
    Route,
    /// Chain agents in declared order, threading `output_state` forward.
    Sequential {
        /// Agent names, in execution order.
        agents: Vec<String>,
        /// When `true`, an agent failure is recorded in `data.errors[name]`
        /// rather than halting the chain.
        continue_on_error: bool,
    },
    /// Run agents concurrently against independent state clones.
    Collaborative {
        /// Agent names to invoke concurrently.
        agents: Vec<String>,
        /// Minimum fraction, in `[0, 1]`, of agents that must succeed.
        failure_threshold: f64,
        /// Optional bound on concurrent invocations; `None` means unbounded.
        max_concurrency: Option<usize>,
    },
    /// Repeat a single agent until it signals completion or a bound is hit.
    Loop {
        /// The agent to repeat.
        agent: String,
        /// Maximum number of iterations, regardless of signal.
        max_iterations: u32,
    },
    /// Collaborative phase whose merged output feeds a Sequential phase.
    Mixed {
        /// Agents run concurrently first.
        collaborative_agents: Vec<String>,
        /// Failure threshold applied to the collaborative phase.
        failure_threshold: f64,
        /// Agents run in order afterward, over the merged state.
        sequential_agents: Vec<String>,
        /// Whether the sequential phase continues past agent failures.
        continue_on_error: bool,
    },
}

/// Orchestrator contract: resolves an event against registered agents and
/// produces a single aggregate result.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Dispatches `event` against `state`, returning the aggregate result.
    async fn dispatch(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
    ) -> OrchestratorResult<AgentResult>;
}

/// Reference orchestrator implementing the five composition modes over a
/// fixed agent table and callback registry.
pub struct ModeOrchestrator {
    mode: OrchestrationMode,
    agents: HashMap<String, RegisteredAgent>,
    callbacks: Arc<CallbackRegistry>,
    error_handler: Option<String>,
}

impl ModeOrchestrator {
    /// Creates a new orchestrator over the given agent table.
    #[must_use]
    pub fn new(
        mode: OrchestrationMode,
        agents: HashMap<String, RegisteredAgent>,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        Self {
            mode,
            agents,
            callbacks,
            error_handler: None,
        }
    }

    /// Sets the fallback agent invoked by Route mode when no route resolves.
    #[must_use]
    pub fn with_error_handler(mut self, agent_name: impl Into<String>) -> Self {
        self.error_handler = Some(agent_name.into());
        self
    }

    /// Builds an orchestrator and validates its mode against the agent table,
    /// rejecting configurations that could never dispatch successfully.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Configuration`] if Sequential names zero
    /// agents, Loop's `max_iterations` is zero, or any named agent is either
    /// unregistered or disabled. Returns [`OrchestratorError::Configuration`]
    /// as well when Collaborative's `failure_threshold` falls outside `[0, 1]`.
    pub fn try_new(
        mode: OrchestrationMode,
        agents: HashMap<String, RegisteredAgent>,
        callbacks: Arc<CallbackRegistry>,
    ) -> OrchestratorResult<Self> {
        let orchestrator = Self::new(mode, agents, callbacks);
        orchestrator.validate()?;
        Ok(orchestrator)
    }

    /// Validates the configured mode against the agent table without
    /// dispatching anything. See [`ModeOrchestrator::try_new`] for the
    /// conditions checked.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Configuration`] on any invalid mode/agent
    /// combination; see [`ModeOrchestrator::try_new`].
    pub fn validate(&self) -> OrchestratorResult<()> {
        match &self.mode {
            OrchestrationMode::Route => Ok(()),
            OrchestrationMode::Sequential { agents, .. } => {
                if agents.is_empty() {
                    return Err(OrchestratorError::Configuration {
                        reason: "sequential mode requires at least one agent".into(),
                    });
                }
                self.check_enabled(agents)
            }
            OrchestrationMode::Collaborative {
                agents,
                failure_threshold,
                ..
            } => {
                self.check_threshold(*failure_threshold)?;
                self.check_enabled(agents)
            }
            OrchestrationMode::Loop { agent, max_iterations } => {
                if *max_iterations == 0 {
                    return Err(OrchestratorError::Configuration {
                        reason: "loop mode requires max_iterations > 0".into(),
                    });
                }
                self.check_enabled(std::slice::from_ref(agent))
            }
            OrchestrationMode::Mixed {
                collaborative_agents,
                failure_threshold,
                sequential_agents,
                ..
            } => {
                self.check_threshold(*failure_threshold)?;
                if sequential_agents.is_empty() {
                    return Err(OrchestratorError::Configuration {
                        reason: "mixed mode's sequential phase requires at least one agent".into(),
                    });
                }
                self.check_enabled(collaborative_agents)?;
                self.check_enabled(sequential_agents)
            }
        }
    }

    fn check_threshold(&self, failure_threshold: f64) -> OrchestratorResult<()> {
        if !(0.0..=1.0).contains(&failure_threshold) {
            return Err(OrchestratorError::Configuration {
                reason: format!("failure_threshold {failure_threshold} is outside [0, 1]"),
            });
        }
        Ok(())
    }

    fn check_enabled(&self, names: &[String]) -> OrchestratorResult<()> {
        for name in names {
            let agent = self.resolve(name)?;
            if !agent.manifest().enabled() {
                return Err(OrchestratorError::Configuration {
                    reason: format!("agent `{name}` is disabled and cannot be scheduled"),
                });
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> OrchestratorResult<&RegisteredAgent> {
        self.agents
            .get(name)
            .ok_or_else(|| OrchestratorError::UnknownAgent { name: name.to_owned() })
    }

    #[instrument(skip(self, ctx, event, state))]
    async fn invoke_one(
        &self,
        ctx: &Context,
        event: &Event,
        name: &str,
        state: &State,
    ) -> OrchestratorResult<AgentResult> {
        let agent = self.resolve(name)?;

        let replacement = invoke_best_effort(
            &self.callbacks,
            HookPoint::BeforeAgentRun,
            CallbackArgs::for_agent(event.clone(), state.clone(), name),
        )
        .await;
        let effective_state = replacement.as_ref().unwrap_or(state);

        let result = agent.handler().run(ctx, event, effective_state).await;

        if result.is_success() {
            invoke_best_effort(
                &self.callbacks,
                HookPoint::AfterAgentRun,
                CallbackArgs::for_agent(event.clone(), state.clone(), name)
                    .with_result(result.clone()),
            )
            .await;
        } else {
            warn!(agent = name, error = result.error(), "agent invocation failed");
            invoke_best_effort(
                &self.callbacks,
                HookPoint::AgentError,
                CallbackArgs::for_agent(event.clone(), state.clone(), name)
                    .with_result(result.clone()),
            )
            .await;
        }

        Ok(result)
    }

    async fn dispatch_route(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
    ) -> OrchestratorResult<AgentResult> {
        let target = event.route().map(str::to_owned).or_else(|| self.error_handler.clone());
        let Some(target) = target else {
            return Err(OrchestratorError::NoRoute);
        };
        self.invoke_one(ctx, event, &target, state).await
    }

    async fn dispatch_sequential(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
        agents: &[String],
        continue_on_error: bool,
    ) -> OrchestratorResult<AgentResult> {
        let mut current = state.clone();
        for name in agents {
            let result = self.invoke_one(ctx, event, name, &current).await?;
            if result.is_success() {
                current = result.into_output_state();
            } else if continue_on_error {
                let mut errored = current.clone();
                let mut errors = errored
                    .get("errors")
                    .and_then(|v| v.as_object().cloned())
                    .unwrap_or_default();
                errors.insert(name.clone(), Value::from(result.error().to_owned()));
                errored.set("errors", Value::Object(errors));
                current = errored;
            } else {
                return Err(OrchestratorError::AgentFailed {
                    agent: name.clone(),
                    reason: result.error().to_owned(),
                });
            }
        }
        Ok(AgentResult::success(current))
    }

    async fn dispatch_collaborative(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
        agents: &[String],
        failure_threshold: f64,
        max_concurrency: Option<usize>,
    ) -> OrchestratorResult<AgentResult> {
        let permits = Arc::new(tokio::sync::Semaphore::new(
            max_concurrency.unwrap_or(agents.len().max(1)),
        ));

        let futures = agents.iter().map(|name| {
            let permits = Arc::clone(&permits);
            async move {
                let _permit = permits.acquire().await.expect("semaphore not closed");
                let result = self.invoke_one(ctx, event, name, state).await;
                (name.clone(), result)
            }
        });

        let outcomes = futures::future::join_all(futures).await;

        let total = outcomes.len();
        let mut succeeded = 0usize;
        let mut merged = state.clone();
        let mut results_list = Vec::with_capacity(total);

        for (name, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    if result.is_success() {
                        succeeded += 1;
                    }
                    let summary = serde_json::json!({
                        "agent": name,
                        "success": result.is_success(),
                        "error": result.error(),
                    });
                    results_list.push(summary);
                    merged.set(name.clone(), Value::Object(
                        result
                            .output_state()
                            .data()
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ));
                }
                Err(err) => {
                    results_list.push(serde_json::json!({
                        "agent": name,
                        "success": false,
                        "error": err.to_string(),
                    }));
                }
            }
        }

        merged.set("results", Value::Array(results_list));

        let fraction = if total == 0 { 1.0 } else { succeeded as f64 / total as f64 };
        if fraction + f64::EPSILON < failure_threshold {
            return Err(OrchestratorError::FailureThresholdExceeded {
                succeeded,
                total,
                threshold: failure_threshold,
            });
        }

        Ok(AgentResult::success(merged))
    }

    async fn dispatch_loop(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
        agent: &str,
        max_iterations: u32,
    ) -> OrchestratorResult<AgentResult> {
        let mut current = state.clone();
        for _ in 0..max_iterations.max(1) {
            if ctx.is_expired() {
                break;
            }
            let result = self.invoke_one(ctx, event, agent, &current).await?;
            if !result.is_success() {
                return Err(OrchestratorError::AgentFailed {
                    agent: agent.to_owned(),
                    reason: result.error().to_owned(),
                });
            }
            current = result.into_output_state();
            let done = current
                .get("loop_done")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if done {
                break;
            }
        }
        Ok(AgentResult::success(current))
    }

    async fn dispatch_mixed(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
        collaborative_agents: &[String],
        failure_threshold: f64,
        sequential_agents: &[String],
        continue_on_error: bool,
    ) -> OrchestratorResult<AgentResult> {
        let collaborative_result = self
            .dispatch_collaborative(ctx, event, state, collaborative_agents, failure_threshold, None)
            .await?;
        let merged = collaborative_result.into_output_state();
        self.dispatch_sequential(ctx, event, &merged, sequential_agents, continue_on_error)
            .await
    }
}

#[async_trait]
impl Orchestrator for ModeOrchestrator {
    #[instrument(skip(self, ctx, event, state), fields(event_id = %event.id()))]
    async fn dispatch(
        &self,
        ctx: &Context,
        event: &Event,
        state: &State,
    ) -> OrchestratorResult<AgentResult> {
        let replacement = invoke_best_effort(
            &self.callbacks,
            HookPoint::BeforeEventHandling,
            CallbackArgs::for_event(event.clone(), state.clone()),
        )
        .await;
        let state = replacement.as_ref().unwrap_or(state);

        let result = match &self.mode {
            OrchestrationMode::Route => self.dispatch_route(ctx, event, state).await,
            OrchestrationMode::Sequential { agents, continue_on_error } => {
                self.dispatch_sequential(ctx, event, state, agents, *continue_on_error).await
            }
            OrchestrationMode::Collaborative {
                agents,
                failure_threshold,
                max_concurrency,
            } => {
                self.dispatch_collaborative(
                    ctx,
                    event,
                    state,
                    agents,
                    *failure_threshold,
                    *max_concurrency,
                )
                .await
            }
            OrchestrationMode::Loop { agent, max_iterations } => {
                self.dispatch_loop(ctx, event, state, agent, *max_iterations).await
            }
            OrchestrationMode::Mixed {
                collaborative_agents,
                failure_threshold,
                sequential_agents,
                continue_on_error,
            } => {
                self.dispatch_mixed(
                    ctx,
                    event,
                    state,
                    collaborative_agents,
                    *failure_threshold,
                    sequential_agents,
                    *continue_on_error,
                )
                .await
            }
        };

        if let Ok(ref agent_result) = result {
            invoke_best_effort(
                &self.callbacks,
                HookPoint::AfterEventHandling,
                CallbackArgs::for_event(event.clone(), state.clone())
                    .with_result(agent_result.clone()),
            )
            .await;
        }

        if result.is_ok() {
            info!("event dispatched successfully");
        }

        result
    }
}

/// Configuration handed to an [`OrchestratorFactory`] when constructing an instance.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// The composition mode to build.
    pub mode: OrchestrationMode,
    /// Overall deadline applied to the dispatch, if any.
    pub timeout: Option<Duration>,
}

/// Process-wide registry of named orchestrator-construction factories.
pub type OrchestratorRegistry = FactoryRegistry<dyn Orchestrator, OrchestratorConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Context;
    use std::collections::HashMap as Map;

    struct Uppercase;

    #[async_trait]
    impl AgentHandler for Uppercase {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            let input = state
                .get("response")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_uppercase();
            let mut output = state.clone();
            output.set("response", Value::from(input));
            AgentResult::success(output)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl AgentHandler for AlwaysFails {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            AgentResult::failure(state.clone(), "boom")
        }
    }

    fn manifest(name: &str) -> AgentManifest {
        AgentManifest::builder(agent_primitives::AgentId::random())
            .name(name)
            .unwrap()
            .build()
            .unwrap()
    }

    fn agents(pairs: Vec<(&str, Arc<dyn AgentHandler>)>) -> Map<String, RegisteredAgent> {
        pairs
            .into_iter()
            .map(|(name, handler)| {
                (name.to_owned(), RegisteredAgent::new(manifest(name), handler))
            })
            .collect()
    }

    #[tokio::test]
    async fn route_mode_dispatches_by_metadata() {
        let table = agents(vec![("shout", Arc::new(Uppercase))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Route,
            table,
            Arc::new(CallbackRegistry::new()),
        );

        let mut state = State::new();
        state.set("response", Value::from("hi"));
        let event = Event::for_agent("shout", Default::default());

        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &state)
            .await
            .unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("HI")));
    }

    #[tokio::test]
    async fn route_mode_without_route_errors() {
        let table = agents(vec![]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Route,
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let err = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NoRoute));
    }

    #[tokio::test]
    async fn sequential_mode_chains_output() {
        let table = agents(vec![
            ("first", Arc::new(Uppercase)),
            ("second", Arc::new(Uppercase)),
        ]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Sequential {
                agents: vec!["first".into(), "second".into()],
                continue_on_error: false,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );

        let mut state = State::new();
        state.set("response", Value::from("hi"));
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &state)
            .await
            .unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("HI")));
    }

    #[tokio::test]
    async fn sequential_mode_halts_on_error_by_default() {
        let table = agents(vec![("broken", Arc::new(AlwaysFails))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Sequential {
                agents: vec!["broken".into()],
                continue_on_error: false,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let err = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AgentFailed { .. }));
    }

    #[tokio::test]
    async fn sequential_mode_continue_on_error_records_errors() {
        let table = agents(vec![("broken", Arc::new(AlwaysFails))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Sequential {
                agents: vec!["broken".into()],
                continue_on_error: true,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap();
        let errors = result.output_state().get("errors").unwrap();
        assert!(errors.get("broken").is_some());
    }

    #[tokio::test]
    async fn collaborative_mode_aggregates_results() {
        let table = agents(vec![
            ("a", Arc::new(Uppercase)),
            ("b", Arc::new(Uppercase)),
        ]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Collaborative {
                agents: vec!["a".into(), "b".into()],
                failure_threshold: 1.0,
                max_concurrency: None,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );

        let mut state = State::new();
        state.set("response", Value::from("hi"));
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &state)
            .await
            .unwrap();
        assert!(result.output_state().get("a").is_some());
        assert!(result.output_state().get("b").is_some());
        assert_eq!(result.output_state().get("results").unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn collaborative_mode_respects_partial_failure_threshold() {
        let table = agents(vec![
            ("ok", Arc::new(Uppercase)),
            ("broken", Arc::new(AlwaysFails)),
        ]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Collaborative {
                agents: vec!["ok".into(), "broken".into()],
                failure_threshold: 0.5,
                max_concurrency: None,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn collaborative_mode_below_threshold_errors() {
        let table = agents(vec![("broken", Arc::new(AlwaysFails))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Collaborative {
                agents: vec!["broken".into()],
                failure_threshold: 1.0,
                max_concurrency: None,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let err = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::FailureThresholdExceeded { .. }));
    }

    struct CountingLoop {
        limit: i64,
    }

    #[async_trait]
    impl AgentHandler for CountingLoop {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            let count = state.get("count").and_then(Value::as_i64).unwrap_or(0) + 1;
            let mut output = state.clone();
            output.set("count", Value::from(count));
            output.set("loop_done", Value::from(count >= self.limit));
            AgentResult::success(output)
        }
    }

    #[tokio::test]
    async fn loop_mode_terminates_on_loop_done() {
        let table = agents(vec![("counter", Arc::new(CountingLoop { limit: 3 }))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Loop {
                agent: "counter".into(),
                max_iterations: 10,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap();
        assert_eq!(result.output_state().get("count"), Some(&Value::from(3)));
    }

    #[tokio::test]
    async fn loop_mode_respects_max_iterations() {
        let table = agents(vec![("counter", Arc::new(CountingLoop { limit: 100 }))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Loop {
                agent: "counter".into(),
                max_iterations: 5,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap();
        assert_eq!(result.output_state().get("count"), Some(&Value::from(5)));
    }

    #[tokio::test]
    async fn mixed_mode_feeds_collaborative_output_into_sequential() {
        let table = agents(vec![
            ("a", Arc::new(Uppercase)),
            ("b", Arc::new(Uppercase)),
            ("summarize", Arc::new(Uppercase)),
        ]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Mixed {
                collaborative_agents: vec!["a".into(), "b".into()],
                failure_threshold: 1.0,
                sequential_agents: vec!["summarize".into()],
                continue_on_error: false,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );

        let mut state = State::new();
        state.set("response", Value::from("hi"));
        let event = Event::new(Default::default(), Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &state)
            .await
            .unwrap();
        assert!(result.output_state().get("a").is_some());
        assert_eq!(result.output_state().get("response"), Some(&Value::from("HI")));
    }

    #[tokio::test]
    async fn before_event_hook_replacement_reaches_dispatch() {
        let table = agents(vec![("shout", Arc::new(Uppercase))]);
        let callbacks = Arc::new(CallbackRegistry::new());
        callbacks
            .register(HookPoint::BeforeEventHandling, "inject", |args: &CallbackArgs| {
                let mut state = args.state.clone();
                state.set("response", Value::from("replaced"));
                async move { Some(state) }
            })
            .unwrap();

        let orchestrator = ModeOrchestrator::new(OrchestrationMode::Route, table, callbacks);
        let event = Event::for_agent("shout", Default::default());
        let result = orchestrator
            .dispatch(&Context::new("s1"), &event, &State::new())
            .await
            .unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("REPLACED")));
    }

    #[tokio::test]
    async fn before_agent_hook_replacement_reaches_handler() {
        let table = agents(vec![("shout", Arc::new(Uppercase))]);
        let callbacks = Arc::new(CallbackRegistry::new());
        callbacks
            .register(HookPoint::BeforeAgentRun, "inject", |args: &CallbackArgs| {
                let mut state = args.state.clone();
                state.set("response", Value::from("swapped"));
                async move { Some(state) }
            })
            .unwrap();

        let orchestrator = ModeOrchestrator::new(OrchestrationMode::Route, table, callbacks);
        let mut state = State::new();
        state.set("response", Value::from("original"));
        let event = Event::for_agent("shout", Default::default());
        let result = orchestrator.dispatch(&Context::new("s1"), &event, &state).await.unwrap();
        assert_eq!(result.output_state().get("response"), Some(&Value::from("SWAPPED")));
    }

    #[test]
    fn validate_rejects_empty_sequential() {
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Sequential { agents: vec![], continue_on_error: false },
            Map::new(),
            Arc::new(CallbackRegistry::new()),
        );
        let err = orchestrator.validate().unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }

    #[test]
    fn validate_rejects_zero_iteration_loop() {
        let table = agents(vec![("counter", Arc::new(CountingLoop { limit: 1 }))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Loop { agent: "counter".into(), max_iterations: 0 },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let err = orchestrator.validate().unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }

    #[test]
    fn validate_rejects_disabled_agent() {
        let disabled = AgentManifest::builder(agent_primitives::AgentId::random())
            .name("sleepy")
            .unwrap()
            .enabled(false)
            .build()
            .unwrap();
        let mut table = Map::new();
        table.insert("sleepy".into(), RegisteredAgent::new(disabled, Arc::new(Uppercase)));

        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Sequential { agents: vec!["sleepy".into()], continue_on_error: false },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let err = orchestrator.validate().unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }

    #[test]
    fn validate_rejects_threshold_out_of_range() {
        let table = agents(vec![("a", Arc::new(Uppercase))]);
        let orchestrator = ModeOrchestrator::new(
            OrchestrationMode::Collaborative {
                agents: vec!["a".into()],
                failure_threshold: 1.5,
                max_concurrency: None,
            },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        let err = orchestrator.validate().unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }

    #[test]
    fn validate_accepts_well_formed_mode() {
        let table = agents(vec![("a", Arc::new(Uppercase))]);
        let orchestrator = ModeOrchestrator::try_new(
            OrchestrationMode::Sequential { agents: vec!["a".into()], continue_on_error: false },
            table,
            Arc::new(CallbackRegistry::new()),
        );
        assert!(orchestrator.is_ok());
    }
}
