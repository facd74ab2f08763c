//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Tracer and meter provider bootstrap with optional OTLP export
//! - Structured logging bridged into OpenTelemetry traces
//! - Trace context fields on log events

pub mod enrich;
pub mod providers;
pub mod tracing;

pub use enrich::TraceContextFormat;
pub use providers::{init_providers, TelemetryGuard};
pub use self::tracing::{init_test_tracing, init_tracing};
