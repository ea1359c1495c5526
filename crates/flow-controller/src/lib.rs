//! Flow execution contexts with span propagation.
//!
//! A flow owns tasks, a task owns subtasks. Each level gets a strongly typed
//! context built from its parent, one span nested under its parent's span,
//! and a single failure path (`wrap_error_end_span`) that logs the failure,
//! wraps it with a description and closes the span.
//!
//! # Hierarchy
//!
//! ```text
//! FlowContext (user, flow, Collaborators)
//!   └─ TaskContext (task id, title, input)
//!       └─ SubtaskContext (subtask id, title, description, message chain)
//! ```
//!
//! # Usage
//!
//! 1. Build a `Collaborators` bundle once per flow with `CollaboratorsBuilder`.
//! 2. Create a `FlowContext` and hand it to `FlowExecutor::execute_flow`
//!    together with a `FlowPlan` and a `SubtaskRunner`.
//! 3. Inside a runner, report any collaborator failure through
//!    `wrap_error_end_span` and return the wrapped error.

pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod loader;
pub mod recording;
pub mod runner;
pub mod span;
pub mod telemetry;
pub mod worker;
pub mod wrap;

#[cfg(test)]
mod test_support;

pub use collaborators::{Collaborators, CollaboratorsBuilder};
pub use config::{ControllerConfig, LoggingConfig, RecordingConfig};
pub use context::{ExecutionScope, FlowContext, ScopeIdentity, SubtaskContext, TaskContext};
pub use error::{
    BoxError, CollaboratorError, ConfigError, ControllerError, RecordingError, Result,
    WrappedError,
};
pub use executor::{
    FlowExecutor, FlowPlan, FlowReport, SubtaskPlan, SubtaskReport, SubtaskRunner,
    TaskConcurrency, TaskPlan, TaskReport,
};
pub use loader::load_flow_plan;
pub use recording::{RecordExt, RecordingPolicy, WorkerKind};
pub use runner::ModelToolRunner;
pub use span::{ScopedSpan, SpanOutcome, SpanState};
pub use telemetry::init_tracing;
pub use worker::{ChannelWorker, PublisherSink, Record, RecordSink};
pub use wrap::wrap_error_end_span;

pub use flow_span;
