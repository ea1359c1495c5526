//! Error types for the flow controller
//!
//! Failures are classified as construction errors (bad identity fields),
//! collaborator failures (wrapped once at the point they occur), recording
//! failures (escalated only under a strict policy), cancellation and
//! configuration errors.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// Boxed cause carried by a wrapped error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by collaborator implementations
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Free-form failure reported by the collaborator
    #[error("{0}")]
    Message(String),

    /// The requested record or tool does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator is not reachable or not configured
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator answered with something unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Payload (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CollaboratorError {
    pub fn msg(msg: impl Into<String>) -> Self {
        CollaboratorError::Message(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CollaboratorError::NotFound(what.into())
    }

    pub fn unavailable(what: impl Into<String>) -> Self {
        CollaboratorError::Unavailable(what.into())
    }
}

/// Errors raised by the recording workers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("{worker} queue is full")]
    QueueFull { worker: &'static str },

    #[error("{worker} worker is closed")]
    Closed { worker: &'static str },

    #[error("{worker} sink rejected entry: {message}")]
    Sink { worker: &'static str, message: String },

    #[error("{worker} failed {failures} consecutive appends")]
    Sustained { worker: &'static str, failures: u32 },
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// A failure annotated with what was being attempted.
///
/// Displays as `"<description>: <cause>"`; the cause stays reachable
/// through `source()`.
#[derive(Error, Debug)]
#[error("{description}: {source}")]
pub struct WrappedError {
    description: String,
    source: BoxError,
}

impl WrappedError {
    pub fn new(description: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            description: description.into(),
            source: cause.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Main error type for controller operations
#[derive(Error, Debug)]
pub enum ControllerError {
    /// A context was built with a missing or blank identity field
    #[error("invalid {context} context: {field} {reason}")]
    Construction {
        context: &'static str,
        field: &'static str,
        reason: &'static str,
    },

    /// A failure wrapped with a description at the point it occurred
    #[error(transparent)]
    Wrapped(#[from] WrappedError),

    /// The owning flow or task was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Persistence holds nothing to resume
    #[error("nothing to load")]
    NothingToLoad,

    /// A recording worker failed under a strict recording policy
    #[error("recording failed: {0}")]
    Recording(#[from] RecordingError),

    /// Unwrapped collaborator failure
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ControllerError {
    /// Field must not be empty
    pub fn empty_field(context: &'static str, field: &'static str) -> Self {
        ControllerError::Construction {
            context,
            field,
            reason: "must not be empty",
        }
    }

    /// Id must be a positive number
    pub fn invalid_id(context: &'static str, field: &'static str) -> Self {
        ControllerError::Construction {
            context,
            field,
            reason: "must be positive",
        }
    }

    /// Bundle member was never supplied
    pub fn missing_collaborator(field: &'static str) -> Self {
        ControllerError::Construction {
            context: "collaborator",
            field,
            reason: "is missing",
        }
    }

    pub fn wrap(description: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        ControllerError::Wrapped(WrappedError::new(description, cause))
    }

    pub fn is_construction(&self) -> bool {
        matches!(self, ControllerError::Construction { .. })
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, ControllerError::Wrapped(_))
    }

    /// True if this error, or any cause in its chain, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(ControllerError::Cancelled) = err.downcast_ref::<ControllerError>() {
                return true;
            }
            current = err.source();
        }
        false
    }

    /// Descriptions of every wrap in the chain, outermost first.
    pub fn descriptions(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(ControllerError::Wrapped(wrapped)) = err.downcast_ref::<ControllerError>() {
                out.push(wrapped.description().to_string());
            } else if let Some(wrapped) = err.downcast_ref::<WrappedError>() {
                out.push(wrapped.description().to_string());
            }
            current = err.source();
        }
        out
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
