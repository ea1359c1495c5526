//! Execution span types for flow/task/subtask instrumentation.
//!
//! This crate provides the span handle contract the controller consumes and
//! a reference in-memory backend.
//!
//! # Span Hierarchy
//!
//! ```text
//! Flow
//!   └─ Task (zero or more)
//!       └─ Subtask (zero or more)
//! ```
//!
//! # Usage
//!
//! 1. Supply a `Tracer` (`MemoryTracer`, `NoopTracer` or an external backend).
//! 2. Open one span per unit of work with `Tracer::start_span`.
//! 3. End it exactly once with `SpanHandle::end`.

pub mod context;
pub mod handle;
pub mod memory;
pub mod span;
pub mod tree;

pub use context::TraceContext;
pub use handle::{NoopTracer, SpanHandle, Tracer};
pub use memory::MemoryTracer;
pub use span::{ExecutionSpan, ObservationLevel, SpanEnd, SpanKind, SpanRequest, SpanStatus};
pub use tree::SpanTree;
