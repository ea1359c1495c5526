//! Error-Span Wrapper
//!
//! The single path through which an execution failure is logged, wrapped
//! with a description of what was being attempted, and used to close the
//! active span with error status.

use crate::context::ExecutionScope;
use crate::error::{BoxError, ControllerError};
use crate::span::ScopedSpan;

/// Log `err`, wrap it as `"<description>: <err>"` and end `span` with that
/// message at error level.
///
/// Returns the wrapped error for the caller to return immediately. Calling
/// it again on an already ended span still returns the same wrapped
/// message but leaves the span untouched.
pub fn wrap_error_end_span<S, E>(
    scope: &S,
    span: &ScopedSpan,
    description: &str,
    err: E,
) -> ControllerError
where
    S: ExecutionScope + ?Sized,
    E: Into<BoxError>,
{
    let cause: BoxError = err.into();
    let identity = scope.identity();

    tracing::error!(
        user_id = identity.user_id,
        flow_id = identity.flow_id,
        task_id = ?identity.task_id,
        subtask_id = ?identity.subtask_id,
        span_id = %span.span_id(),
        error = %cause,
        "{}",
        description
    );

    let wrapped = ControllerError::wrap(description, cause);
    span.end_error(wrapped.to_string());
    wrapped
}
