//! Event queue, worker pool, orchestrator, and callback registry for agent runtimes.
//!
//! This crate provides the building blocks used by a running multi-agent
//! system: the [`Event`]/[`State`]/[`AgentResult`] data model, the closed set
//! of callback hook points, the [`AgentHandler`] contract agents implement,
//! the [`Orchestrator`] composition modes (Route, Sequential, Collaborative,
//! Loop, Mixed), and the [`Runner`] that ties them to a `tokio` worker pool.

#![warn(missing_docs, clippy::pedantic)]

mod callback;
mod event;
mod handler;
mod lifecycle;
mod orchestrator;
mod runner;
mod scheduler;
mod workflow;

pub use callback::{
    Callback, CallbackArgs, CallbackError, CallbackOutcome, CallbackRegistry, CallbackResult,
    HookPoint,
};
pub use event::{
    AgentMetrics, AgentResult, Chunk, ChunkKind, Event, State, TraceRecord, ROUTE_METADATA_KEY,
};
pub use handler::{AgentHandler, ChunkStream, Context, HandlerError, HandlerResult, StreamHandle};
pub use lifecycle::{AgentState, Lifecycle, LifecycleError, LifecycleEvent, LifecycleResult};
pub use orchestrator::{
    ModeOrchestrator, Orchestrator, OrchestrationMode, OrchestratorConfig, OrchestratorError,
    OrchestratorRegistry, OrchestratorResult, RegisteredAgent,
};
pub use runner::{Runner, RunnerConfig, RunnerError, RunnerResult};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};
pub use workflow::{
    ParallelWorkflow, Step, StepError, Workflow, WorkflowError, WorkflowResult,
};
