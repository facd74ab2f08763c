//! Structured logging setup.
//!
//! Configures:
//! - Console logging as text or JSON
//! - Environment-based filter (RUST_LOG, then the configured level)
//! - An OpenTelemetry layer that exports `tracing` spans
//! - Trace context fields on every event logged inside a span

use opentelemetry::trace::TracerProvider as _;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::enrich::TraceContextFormat;
use super::providers::TelemetryGuard;
use crate::config::{LogFormat, TelemetryConfig};
use crate::error::{Result, TelemetryError};

/// Install the global `tracing` subscriber.
///
/// Spans opened through `tracing` are exported via the guard's tracer provider.
///
/// # Errors
///
/// Returns [`TelemetryError::Config`] if a subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig, guard: &TelemetryGuard) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let otel_layer = tracing_opentelemetry::layer()
        .with_tracer(guard.tracer_provider().tracer(env!("CARGO_PKG_NAME")));

    // Enriched lines are rendered into a plain buffer first, so no colors
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);
    let installed = match config.log_format {
        LogFormat::Text => registry
            .with(fmt_layer.map_event_format(TraceContextFormat::text))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt_layer
                    .json()
                    .with_current_span(true)
                    .map_event_format(TraceContextFormat::json),
            )
            .try_init(),
    };
    installed.map_err(|e| TelemetryError::Config(format!("logging already initialized: {e}")))?;

    tracing::info!(
        component = %config.component,
        level = %config.log_level,
        format = ?config.log_format,
        "Tracing initialized"
    );
    Ok(())
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
