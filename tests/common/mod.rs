//! Test harness for instrumentation tests.
//!
//! Provides:
//! - Facades wired to recording metric emitters
//! - Facades wired to an in-memory span exporter
//! - A factory that counts how many facades it built

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use telemetry_facade::observability::init_test_tracing;
use telemetry_facade::testing::{DisabledSpanEmitter, InMemoryTracing, RecordingMetricEmitter};
use telemetry_facade::{Instrumentation, InstrumentationFactory};

/// A well-formed upstream trace context.
pub const TOKEN: &str = "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01";

/// Facade with tracing disabled and metrics recorded in memory.
pub fn recording_instrumentation(
    component: &str,
    creation_delay: Option<Duration>,
) -> (Instrumentation, Arc<RecordingMetricEmitter>) {
    init_test_tracing();
    let mut metrics = RecordingMetricEmitter::new();
    if let Some(delay) = creation_delay {
        metrics = metrics.with_creation_delay(delay);
    }
    let metrics = Arc::new(metrics);

    let instrumentation = Instrumentation::with_emitters(
        component,
        None,
        Arc::new(DisabledSpanEmitter),
        metrics.clone(),
    )
    .expect("valid component");
    (instrumentation, metrics)
}

/// Facade whose finished spans land in the returned [`InMemoryTracing`].
pub fn traced_instrumentation(component: &str) -> (Instrumentation, InMemoryTracing) {
    init_test_tracing();
    let tracing = InMemoryTracing::new();
    let instrumentation = Instrumentation::with_emitters(
        component,
        None,
        Arc::new(tracing.span_emitter(component, "1.0.0")),
        Arc::new(RecordingMetricEmitter::new()),
    )
    .expect("valid component");
    (instrumentation, tracing)
}

/// Factory building recording facades, plus a count of builds.
///
/// `build_delay` is slept inside every build to widen first-use races.
pub fn counting_factory(build_delay: Duration) -> (InstrumentationFactory, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let factory = InstrumentationFactory::with_builder(move |component, version| {
        std::thread::sleep(build_delay);
        counter.fetch_add(1, Ordering::SeqCst);
        Instrumentation::with_emitters(
            component,
            Some(version),
            Arc::new(DisabledSpanEmitter),
            Arc::new(RecordingMetricEmitter::new()),
        )
    });
    (factory, builds)
}
