//! OpenTelemetry provider bootstrap.
//!
//! Builds the tracer and meter providers the facade emits into and installs
//! them globally:
//! - OTLP/gRPC export when an endpoint is configured
//! - Record-only providers otherwise (spans are dropped, metrics sit in a
//!   manual reader)

use std::time::Duration;

use opentelemetry::global;
use opentelemetry_sdk::metrics::{ManualReader, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;

use crate::config::TelemetryConfig;
use crate::error::Result;

/// Owns the installed providers. Flushes and shuts them down on drop.
///
/// Keep this guard alive for the duration of your program.
#[derive(Debug)]
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    exporting: bool,
}

impl TelemetryGuard {
    /// The installed tracer provider, used to bridge `tracing` spans.
    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    /// Whether both OTLP exporters were built.
    ///
    /// `false` without an endpoint, or when an exporter failed to build.
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tracer_provider.force_flush() {
            tracing::warn!(error = %e, "Failed to flush spans");
        }
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down tracer provider");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down meter provider");
        }
    }
}

/// Build the SDK resource describing this process.
pub fn resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.component.clone())
        .with_attributes(config.resource_attributes())
        .build()
}

/// Build both providers and install them as the global providers.
///
/// Exporter build failures are logged and fall back to record-only providers.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn init_providers(config: &TelemetryConfig) -> Result<TelemetryGuard> {
    config.validate()?;

    let resource = resource(config);
    let (tracer_provider, spans_exported) = build_tracer_provider(config, resource.clone());
    let (meter_provider, metrics_exported) = build_meter_provider(config, resource);

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(tracer_provider.clone());
    global::set_meter_provider(meter_provider.clone());

    Ok(TelemetryGuard {
        tracer_provider,
        meter_provider,
        exporting: spans_exported && metrics_exported,
    })
}

fn build_tracer_provider(config: &TelemetryConfig, resource: Resource) -> (SdkTracerProvider, bool) {
    let builder = SdkTracerProvider::builder().with_resource(resource);

    let Some(endpoint) = config.otel_endpoint.as_deref() else {
        return (builder.build(), false);
    };

    use opentelemetry_otlp::{SpanExporter, WithExportConfig};

    match SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => {
            tracing::info!(endpoint, "OTLP span exporter configured");
            (builder.with_batch_exporter(exporter).build(), true)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create OTLP span exporter, spans will not be exported");
            (builder.build(), false)
        }
    }
}

fn build_meter_provider(config: &TelemetryConfig, resource: Resource) -> (SdkMeterProvider, bool) {
    let builder = SdkMeterProvider::builder().with_resource(resource);

    let Some(endpoint) = config.otel_endpoint.as_deref() else {
        // Metrics are recorded but not exported
        return (builder.with_reader(ManualReader::builder().build()).build(), false);
    };

    use opentelemetry_otlp::{MetricExporter, WithExportConfig};

    match MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => {
            let reader = PeriodicReader::builder(exporter)
                .with_interval(Duration::from_secs(config.metrics_interval_secs))
                .build();
            tracing::info!(endpoint, "OTLP metrics exporter configured");
            (builder.with_reader(reader).build(), true)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create OTLP metrics exporter, using no-op metrics");
            (builder.with_reader(ManualReader::builder().build()).build(), false)
        }
    }
}
