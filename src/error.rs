//! Error types for the instrumentation facade.
//!
//! Argument errors propagate to the caller. Trace-context errors are
//! recovered locally when they come from a batch of linked tokens.

use thiserror::Error;

/// Reason a serialized trace-context token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraceContextError {
    #[error("expected 4 dash-separated fields, found {0}")]
    FieldCount(usize),

    #[error("version must be two lowercase hex digits other than `ff`")]
    Version,

    #[error("trace id must be 32 lowercase hex digits and not all zero")]
    TraceId,

    #[error("span id must be 16 lowercase hex digits and not all zero")]
    SpanId,

    #[error("flags must be two lowercase hex digits")]
    Flags,
}

/// Errors surfaced by the facade, factory and bootstrap code.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: &'static str,
    },

    #[error("invalid trace context format: {0}")]
    InvalidTraceContextFormat(#[from] TraceContextError),

    #[error("instrumentation `{component}` is not initialized or has been disposed")]
    InstrumentNotInitialized { component: String },

    #[error("span `{name}` could not be started")]
    SpanCreationFailed { name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Shorthand for an empty required string argument.
    pub(crate) fn empty(name: &'static str) -> Self {
        Self::InvalidArgument {
            name,
            reason: "cannot be empty",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;
