//! Telemetry facade: spans and metrics for a component behind one object.
//!
//! An [`Instrumentation`] bundles a span emitter and a metric emitter bound to
//! a (component, version) pair. It starts spans parented on the ambient
//! OpenTelemetry context, links them to serialized `traceparent` tokens from
//! upstream callers, and caches counters and histograms by name.
//!
//! # Modules
//!
//! - [`config`]: CLI, environment and JSON configuration
//! - [`error`]: Error types
//! - [`instrumentation`]: The facade, its factory and the emitter seams
//! - [`observability`]: Provider bootstrap and logging setup
//! - [`trace_context`]: W3C `traceparent` codec
//!
//! # Example
//!
//! ```
//! use telemetry_facade::{InstrumentationFactory, KeyValue};
//!
//! let factory = InstrumentationFactory::default();
//! let instrumentation = factory.create("checkout", Some("2.3.0")).unwrap();
//!
//! let _span = instrumentation
//!     .start_linked_server_span(
//!         "handle_order",
//!         &["00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01"],
//!         &[KeyValue::new("order.kind", "express")],
//!     )
//!     .unwrap();
//! instrumentation.increase_counter("orders", &[], 1).unwrap();
//! instrumentation.record_duration("order_duration", 12, &[]).unwrap();
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // instrumentation::InstrumentationFactory is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc,      // Panic docs can be verbose
    clippy::cast_precision_loss      // i64 -> f64 histogram values
)]

pub mod config;
pub mod error;
pub mod instrumentation;
pub mod observability;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod trace_context;

pub use config::{LogFormat, TelemetryConfig};
pub use error::{Result, TelemetryError, TraceContextError};
pub use instrumentation::{InstrumentOptions, Instrumentation, InstrumentationFactory, Span};
pub use opentelemetry::trace::SpanKind;
pub use opentelemetry::KeyValue;
