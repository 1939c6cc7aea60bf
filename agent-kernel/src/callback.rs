//! The closed set of hook points agents and operators can subscribe to.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::warn;

use crate::event::{AgentResult, Event, State};

/// A fixed point in the event-handling lifecycle at which callbacks may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Runs once per event, before the orchestrator dispatches it.
    BeforeEventHandling,
    /// Runs once per event, after the orchestrator has produced a result.
    AfterEventHandling,
    /// Runs immediately before a single agent is invoked.
    BeforeAgentRun,
    /// Runs immediately after a single agent returns.
    AfterAgentRun,
    /// Runs when an agent invocation produces an error.
    AgentError,
}

impl HookPoint {
    const ALL: [Self; 5] = [
        Self::BeforeEventHandling,
        Self::AfterEventHandling,
        Self::BeforeAgentRun,
        Self::AfterAgentRun,
        Self::AgentError,
    ];
}

/// Arguments passed to a callback invocation.
#[derive(Clone, Debug)]
pub struct CallbackArgs {
    /// The event currently being processed.
    pub event: Event,
    /// The state visible at this hook point.
    pub state: State,
    /// The agent name involved, when the hook point is agent-scoped.
    pub agent_name: Option<String>,
    /// The result produced so far, when available (after-run and error hooks).
    pub result: Option<AgentResult>,
}

impl CallbackArgs {
    /// Creates callback arguments for an event-scoped hook point.
    #[must_use]
    pub fn for_event(event: Event, state: State) -> Self {
        Self {
            event,
            state,
            agent_name: None,
            result: None,
        }
    }

    /// Creates callback arguments for an agent-scoped hook point.
    #[must_use]
    pub fn for_agent(event: Event, state: State, agent_name: impl Into<String>) -> Self {
        Self {
            event,
            state,
            agent_name: Some(agent_name.into()),
            result: None,
        }
    }

    /// Attaches a result and returns the updated arguments.
    #[must_use]
    pub fn with_result(mut self, result: AgentResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// A replacement state a callback may return to override downstream processing.
pub type CallbackOutcome = Option<State>;

/// A single registered callback.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Invokes the callback, optionally returning a replacement state.
    async fn call(&self, args: &CallbackArgs) -> CallbackOutcome;
}

#[async_trait]
impl<F, Fut> Callback for F
where
    F: Send + Sync + Fn(&CallbackArgs) -> Fut,
    Fut: std::future::Future<Output = CallbackOutcome> + Send,
{
    async fn call(&self, args: &CallbackArgs) -> CallbackOutcome {
        (self)(args).await
    }
}

struct Registration {
    name: String,
    callback: Arc<dyn Callback>,
}

/// Errors produced while managing callback registrations.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// A callback with this name is already registered at this hook point.
    #[error("callback `{name}` already registered at {point:?}")]
    DuplicateCallback {
        /// The hook point involved.
        point: HookPoint,
        /// The offending callback name.
        name: String,
    },
}

/// Result alias for callback registry operations.
pub type CallbackResult<T> = Result<T, CallbackError>;

/// Registry of callbacks keyed by hook point, fired in registration order.
///
/// Reentrant: a callback may itself trigger `invoke` for another hook point
/// (e.g. a trace hook subscribed to `AfterAgentRun` that also logs via
/// `tracing`), since invocation only holds the lock for the duration of the
/// snapshot copy, not for the callback calls themselves.
#[derive(Default)]
pub struct CallbackRegistry {
    hooks: RwLock<HashMap<HookPoint, Vec<Registration>>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback under the given hook point and name.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::DuplicateCallback`] if `name` is already
    /// registered at `point`.
    pub fn register<C>(
        &self,
        point: HookPoint,
        name: impl Into<String>,
        callback: C,
    ) -> CallbackResult<()>
    where
        C: Callback + 'static,
    {
        let name = name.into();
        let mut guard = self
            .hooks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries = guard.entry(point).or_default();
        if entries.iter().any(|r| r.name == name) {
            return Err(CallbackError::DuplicateCallback { point, name });
        }
        entries.push(Registration {
            name,
            callback: Arc::new(callback),
        });
        Ok(())
    }

    /// Removes a callback, returning whether one was found.
    pub fn unregister(&self, point: HookPoint, name: &str) -> bool {
        let mut guard = self
            .hooks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(entries) = guard.get_mut(&point) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|r| r.name != name);
        entries.len() != before
    }

    /// Invokes all callbacks registered at `point`, in registration order.
    ///
    /// A callback that returns a replacement state feeds that state into the
    /// next callback in line; the final replacement (if any) is returned to
    /// the caller. Callback implementations are expected not to panic; the
    /// registry does not catch panics itself (the runner's worker boundary
    /// does).
    pub async fn invoke(&self, point: HookPoint, mut args: CallbackArgs) -> CallbackOutcome {
        let callbacks: Vec<Arc<dyn Callback>> = {
            let guard = self
                .hooks
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard
                .get(&point)
                .map(|entries| entries.iter().map(|r| Arc::clone(&r.callback)).collect())
                .unwrap_or_default()
        };

        let mut replacement: CallbackOutcome = None;
        for callback in callbacks {
            if let Some(state) = callback.call(&args).await {
                args.state = state.clone();
                replacement = Some(state);
            }
        }
        replacement
    }

    /// Returns the names of all registered hook points, for diagnostics.
    #[must_use]
    pub fn hook_points(&self) -> Vec<HookPoint> {
        HookPoint::ALL.to_vec()
    }

    /// Returns the registered callback names for a hook point, in order.
    #[must_use]
    pub fn names_at(&self, point: HookPoint) -> Vec<String> {
        let guard = self
            .hooks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .get(&point)
            .map(|entries| entries.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self
            .hooks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let counts: HashMap<String, usize> = guard
            .iter()
            .map(|(point, entries)| (format!("{point:?}"), entries.len()))
            .collect();
        f.debug_struct("CallbackRegistry")
            .field("registered", &counts)
            .finish()
    }
}

/// Best-effort hook invocation used by the runner: logs failures without
/// propagating them, since hook errors must never crash event processing.
pub async fn invoke_best_effort(
    registry: &CallbackRegistry,
    point: HookPoint,
    args: CallbackArgs,
) -> CallbackOutcome {
    let outcome = std::panic::AssertUnwindSafe(registry.invoke(point, args))
        .catch_unwind()
        .await;
    match outcome {
        Ok(replacement) => replacement,
        Err(_) => {
            warn!(?point, "callback panicked; continuing without replacement state");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn args() -> CallbackArgs {
        CallbackArgs::for_event(Event::new(Default::default(), Default::default()), State::new())
    }

    #[tokio::test]
    async fn fires_in_registration_order() {
        let registry = CallbackRegistry::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        registry
            .register(HookPoint::BeforeEventHandling, "a", move |_: &CallbackArgs| {
                let order_a = Arc::clone(&order_a);
                async move {
                    order_a.lock().unwrap().push("a");
                    None
                }
            })
            .unwrap();

        let order_b = Arc::clone(&order);
        registry
            .register(HookPoint::BeforeEventHandling, "b", move |_: &CallbackArgs| {
                let order_b = Arc::clone(&order_b);
                async move {
                    order_b.lock().unwrap().push("b");
                    None
                }
            })
            .unwrap();

        registry.invoke(HookPoint::BeforeEventHandling, args()).await;
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let registry = CallbackRegistry::new();
        registry
            .register(HookPoint::AfterAgentRun, "trace", |_: &CallbackArgs| async { None })
            .unwrap();
        let err = registry
            .register(HookPoint::AfterAgentRun, "trace", |_: &CallbackArgs| async { None })
            .unwrap_err();
        assert!(matches!(err, CallbackError::DuplicateCallback { .. }));
    }

    #[tokio::test]
    async fn unregister_removes_callback() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        registry
            .register(HookPoint::BeforeAgentRun, "counter", move |_: &CallbackArgs| {
                let calls_clone = Arc::clone(&calls_clone);
                async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    None
                }
            })
            .unwrap();

        assert!(registry.unregister(HookPoint::BeforeAgentRun, "counter"));
        registry.invoke(HookPoint::BeforeAgentRun, args()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn replacement_state_is_returned() {
        let registry = CallbackRegistry::new();
        registry
            .register(HookPoint::BeforeEventHandling, "replace", |args: &CallbackArgs| {
                let mut state = args.state.clone();
                state.set("replaced", serde_json::Value::from(true));
                async move { Some(state) }
            })
            .unwrap();

        let outcome = registry
            .invoke(HookPoint::BeforeEventHandling, args())
            .await
            .expect("replacement state");
        assert_eq!(outcome.get("replaced"), Some(&serde_json::Value::from(true)));
    }
}
