//! Wires a configuration document into a fully running [`Runner`].
//!
//! This is the single authoritative construction path the Open Question in
//! `DESIGN.md` settles on: a configuration document plus a handler for every
//! declared agent in, a started-ready [`Runner`] out. There is no separate
//! manual `set_orchestrator` path that bypasses the validation `agent_config`
//! and `agent_kernel::ModeOrchestrator::try_new` already perform.
//!
//! The declarative document (§6 of the runtime's configuration surface) only
//! describes an agent's role, prompt, and capability metadata — never
//! executable behavior — so callers must still supply the concrete
//! [`AgentHandler`] implementation for every agent name the document
//! declares.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use agent_config::{ConfigError, RuntimeConfig};
use agent_kernel::{
    AgentHandler, CallbackRegistry, ModeOrchestrator, OrchestratorError, RegisteredAgent, Runner,
    RunnerConfig,
};
use thiserror::Error;

/// Errors wiring a [`Runner`] from a configuration document.
#[derive(Debug, Error)]
pub enum WiringError {
    /// The configuration document could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The orchestration mode rejected the resolved agent table.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// An agent declared in the configuration had no corresponding handler.
    #[error("no handler supplied for agent `{name}` named in configuration")]
    MissingHandler {
        /// The agent name missing a handler.
        name: String,
    },
}

/// Result alias for wiring operations.
pub type WiringResult<T> = Result<T, WiringError>;

/// Loads a configuration document from `path`, validates it, and builds a
/// [`Runner`] wired to a [`ModeOrchestrator`] over the document's
/// orchestration section and the supplied handlers.
///
/// `handlers` must contain an entry for every `[agents.<name>]` section in
/// the document; extra handlers not named in the document are ignored. The
/// returned runner has not been started — call [`Runner::start`] once the
/// caller is ready to begin processing events.
///
/// # Errors
///
/// Returns [`WiringError::Config`] if the file cannot be read, parsed, or
/// fails semantic validation; [`WiringError::MissingHandler`] if a declared
/// agent has no matching entry in `handlers`; and
/// [`WiringError::Orchestrator`] if the resolved orchestration mode is
/// contradictory (see [`ModeOrchestrator::try_new`]).
pub fn new_runner_from_config(
    path: impl AsRef<Path>,
    runner_config: RunnerConfig,
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
) -> WiringResult<Runner> {
    let config = agent_config::load_from_path(path)?;
    build_runner(&config, runner_config, handlers)
}

/// As [`new_runner_from_config`], but reads the document from an in-memory
/// string rather than a file on disk.
///
/// # Errors
///
/// See [`new_runner_from_config`].
pub fn new_runner_from_config_str(
    raw: &str,
    runner_config: RunnerConfig,
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
) -> WiringResult<Runner> {
    let config = agent_config::load_from_str(raw)?;
    build_runner(&config, runner_config, handlers)
}

fn build_runner(
    config: &RuntimeConfig,
    runner_config: RunnerConfig,
    mut handlers: HashMap<String, Arc<dyn AgentHandler>>,
) -> WiringResult<Runner> {
    let manifests = agent_config::to_agent_manifests(config)?;
    let mode = agent_config::to_orchestration_mode(config)?;

    let mut table = HashMap::with_capacity(manifests.len());
    for (name, manifest) in manifests {
        let handler = handlers
            .remove(&name)
            .ok_or_else(|| WiringError::MissingHandler { name: name.clone() })?;
        table.insert(name, RegisteredAgent::new(manifest, handler));
    }

    let callbacks = Arc::new(CallbackRegistry::new());
    let orchestrator = Arc::new(ModeOrchestrator::try_new(
        mode,
        table.clone(),
        Arc::clone(&callbacks),
    )?);
    let runner = Runner::new(runner_config, orchestrator, Arc::clone(&callbacks));

    for agent in table.into_values() {
        // Already deduplicated by construction above; the orchestrator and
        // the runner's own bookkeeping table are always kept in sync here.
        runner
            .register_agent(agent.manifest().clone(), Arc::clone(agent.handler()))
            .expect("agent table built from a map cannot contain duplicate names");
    }

    Ok(runner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_kernel::{AgentResult, Context, Event, State};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl AgentHandler for Echo {
        async fn run(&self, _ctx: &Context, _event: &Event, state: &State) -> AgentResult {
            let mut output = state.clone();
            output.set("response", serde_json::Value::from("ok"));
            AgentResult::success(output)
        }
    }

    fn document() -> &'static str {
        r#"
            [orchestration]
            mode = "route"

            [agents.echo]
            role = "responder"
        "#
    }

    #[tokio::test]
    async fn wires_runner_and_dispatches() {
        let mut handlers: HashMap<String, Arc<dyn AgentHandler>> = HashMap::new();
        handlers.insert("echo".into(), Arc::new(Echo));

        let runner = new_runner_from_config_str(document(), RunnerConfig::default(), handlers)
            .expect("wiring succeeds");

        let event = Event::for_agent("echo", Default::default());
        let result = runner.dispatch_sync(event, None).await.unwrap();
        assert_eq!(
            result.output_state().get("response"),
            Some(&serde_json::Value::from("ok"))
        );
    }

    #[test]
    fn missing_handler_is_reported() {
        let err = new_runner_from_config_str(document(), RunnerConfig::default(), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, WiringError::MissingHandler { name } if name == "echo"));
    }
}
