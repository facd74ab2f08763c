//! telemetry-demo: drives the instrumentation facade against real providers.
//!
//! # Usage
//!
//! ```bash
//! telemetry-demo --component orders --iterations 10 \
//!     --link 00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01
//! ```
//!
//! Environment variables can also be used:
//! - `RESOURCE_COMPONENT`, `RESOURCE_VERSION`: Component identity
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint (optional)
//! - `LOG_LEVEL`, `LOG_FORMAT`: Logging
//! - `RUST_LOG`: Overrides `LOG_LEVEL`

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Parser;
use opentelemetry::context::FutureExt;
use opentelemetry::trace::{Span as _, TraceContextExt};
use opentelemetry::{Context, KeyValue};
use telemetry_facade::observability::{init_providers, init_tracing};
use telemetry_facade::{Instrumentation, InstrumentationFactory, TelemetryConfig};
use tokio::sync::watch;

/// Emit linked spans, counters and histograms for a demo component.
#[derive(Parser, Debug)]
#[command(name = "telemetry-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load telemetry settings from a JSON file instead of flags
    #[arg(long, env = "TELEMETRY_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Units of work to run
    #[arg(long, default_value_t = 5)]
    iterations: u32,

    /// Pause between units of work in milliseconds
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Upstream traceparent to link every request span to (repeatable)
    #[arg(long = "link")]
    links: Vec<String>,

    #[command(flatten)]
    telemetry: TelemetryConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config_file {
        Some(path) => TelemetryConfig::from_json_file(path)
            .context(format!("failed to load {}", path.display()))?,
        None => {
            cli.telemetry.validate()?;
            cli.telemetry.clone()
        }
    };

    let guard = init_providers(&config)?;
    init_tracing(&config, &guard)?;

    // Logged here since no subscriber existed while the providers were built
    if config.otel_endpoint.is_some() && !guard.is_exporting() {
        tracing::warn!(
            component = %config.component,
            "OTLP endpoint configured but export is unavailable, telemetry stays local"
        );
    } else {
        tracing::info!(
            component = %config.component,
            version = %config.version,
            otlp = guard.is_exporting(),
            "Telemetry providers installed"
        );
    }

    let factory = InstrumentationFactory::default();
    let instrumentation = factory.create(&config.component, Some(config.version.as_str()))?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let interval = Duration::from_millis(cli.interval_ms);
    let links: Vec<&str> = cli.links.iter().map(String::as_str).collect();
    for iteration in 0..cli.iterations {
        if *shutdown_rx.borrow() {
            break;
        }

        handle_request(&instrumentation, &links, iteration).await?;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => {
                tracing::info!(completed = iteration + 1, "Stopping early");
                break;
            }
        }
    }

    instrumentation.dispose();
    drop(guard);
    eprintln!("telemetry-demo finished");
    Ok(())
}

/// One unit of work: a linked server span wrapping a client call.
///
/// Everything inside runs with the server span as the current context.
async fn handle_request(
    instrumentation: &Instrumentation,
    links: &[&str],
    iteration: u32,
) -> anyhow::Result<()> {
    let started = Instant::now();

    let server = instrumentation.start_linked_server_span(
        "process_request",
        links,
        &[KeyValue::new("iteration", i64::from(iteration))],
    )?;
    let cx = match server {
        Some(span) => Context::current_with_span(span),
        None => Context::current(),
    };

    let work = async {
        tracing::info!(iteration, "Handling request");

        call_downstream(instrumentation).await?;

        let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let tags = [KeyValue::new("operation", "process_request")];
        instrumentation.increase_counter("requests", &tags, 1)?;
        instrumentation.record_duration("request_duration", elapsed, &tags)?;
        anyhow::Ok(())
    };
    let result = work.with_context(cx.clone()).await;

    cx.span().end();
    result
}

async fn call_downstream(instrumentation: &Instrumentation) -> anyhow::Result<()> {
    let client = instrumentation.start_client_span(
        "call_downstream",
        &[KeyValue::new("peer.service", "inventory")],
    )?;

    tokio::time::sleep(Duration::from_millis(25)).await;

    if let Some(mut span) = client {
        span.set_attribute(KeyValue::new("http.response.status_code", 200_i64));
        span.end();
    }
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating shutdown...");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }
}
