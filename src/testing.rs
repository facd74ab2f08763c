//! Test doubles for the emitter seams.
//!
//! Compiled for unit tests and behind the `testing` feature so integration
//! tests and downstream crates can use them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

use crate::instrumentation::{
    scope, CounterHandle, CounterInstrument, HistogramHandle, HistogramInstrument,
    InstrumentDescriptor, MetricEmitter, OtelSpanEmitter, Span, SpanEmitter, SpanRequest,
};

/// One recorded `add` or `record` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub value: i64,
    pub tags: Vec<KeyValue>,
}

/// Instrument that keeps every data point in memory.
#[derive(Debug)]
pub struct RecordingInstrument {
    descriptor: InstrumentDescriptor,
    points: Mutex<Vec<DataPoint>>,
}

impl RecordingInstrument {
    fn new(descriptor: InstrumentDescriptor) -> Self {
        Self {
            descriptor,
            points: Mutex::new(Vec::new()),
        }
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    pub fn points(&self) -> Vec<DataPoint> {
        self.points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, value: i64, tags: &[KeyValue]) {
        self.points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DataPoint {
                value,
                tags: tags.to_vec(),
            });
    }
}

impl CounterInstrument for RecordingInstrument {
    fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    fn add(&self, value: i64, tags: &[KeyValue]) {
        self.push(value, tags);
    }
}

impl HistogramInstrument for RecordingInstrument {
    fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    fn record(&self, value: i64, tags: &[KeyValue]) {
        self.push(value, tags);
    }
}

/// [`MetricEmitter`] that counts `create_*` calls and records data points.
#[derive(Debug, Default)]
pub struct RecordingMetricEmitter {
    creation_delay: Option<Duration>,
    counters_created: AtomicUsize,
    histograms_created: AtomicUsize,
    counters: Mutex<HashMap<String, Arc<RecordingInstrument>>>,
    histograms: Mutex<HashMap<String, Arc<RecordingInstrument>>>,
}

impl RecordingMetricEmitter {
    /// Emitter with no creation delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every `create_*` call to widen first-use races.
    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = Some(delay);
        self
    }

    /// Number of `create_counter` calls so far.
    pub fn counters_created(&self) -> usize {
        self.counters_created.load(Ordering::SeqCst)
    }

    /// Number of `create_histogram` calls so far.
    pub fn histograms_created(&self) -> usize {
        self.histograms_created.load(Ordering::SeqCst)
    }

    /// The most recently created counter named `name`.
    pub fn counter(&self, name: &str) -> Option<Arc<RecordingInstrument>> {
        lookup(&self.counters, name)
    }

    /// The most recently created histogram named `name`.
    pub fn histogram(&self, name: &str) -> Option<Arc<RecordingInstrument>> {
        lookup(&self.histograms, name)
    }

    /// Points added to the counter `name`, empty if it was never created.
    pub fn counter_points(&self, name: &str) -> Vec<DataPoint> {
        self.counter(name).map(|c| c.points()).unwrap_or_default()
    }

    /// Points recorded on the histogram `name`, empty if it was never created.
    pub fn histogram_points(&self, name: &str) -> Vec<DataPoint> {
        self.histogram(name).map(|h| h.points()).unwrap_or_default()
    }

    fn create(
        &self,
        created: &AtomicUsize,
        registry: &Mutex<HashMap<String, Arc<RecordingInstrument>>>,
        descriptor: InstrumentDescriptor,
    ) -> Arc<RecordingInstrument> {
        if let Some(delay) = self.creation_delay {
            std::thread::sleep(delay);
        }
        created.fetch_add(1, Ordering::SeqCst);

        let name = descriptor.name.clone();
        let instrument = Arc::new(RecordingInstrument::new(descriptor));
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::clone(&instrument));
        instrument
    }
}

impl MetricEmitter for RecordingMetricEmitter {
    fn create_counter(&self, descriptor: InstrumentDescriptor) -> CounterHandle {
        self.create(&self.counters_created, &self.counters, descriptor)
    }

    fn create_histogram(&self, descriptor: InstrumentDescriptor) -> HistogramHandle {
        self.create(&self.histograms_created, &self.histograms, descriptor)
    }
}

fn lookup(
    registry: &Mutex<HashMap<String, Arc<RecordingInstrument>>>,
    name: &str,
) -> Option<Arc<RecordingInstrument>> {
    registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// [`SpanEmitter`] that behaves like a tracer with sampling turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSpanEmitter;

impl SpanEmitter for DisabledSpanEmitter {
    fn start(&self, _request: SpanRequest, _parent: &Context) -> Option<Span> {
        None
    }
}

/// Tracer provider exporting every finished span to memory.
#[derive(Debug)]
pub struct InMemoryTracing {
    provider: SdkTracerProvider,
    exporter: InMemorySpanExporter,
}

impl Default for InMemoryTracing {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTracing {
    pub fn new() -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        Self { provider, exporter }
    }

    /// A span emitter for `component` bound to this provider.
    pub fn span_emitter(&self, component: &str, version: &str) -> OtelSpanEmitter {
        OtelSpanEmitter::from_provider(&self.provider, scope(component, version))
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap_or_default()
    }

    /// The first finished span called `name`.
    pub fn finished_span(&self, name: &str) -> Option<SpanData> {
        self.finished_spans().into_iter().find(|s| s.name == name)
    }

    /// String form of the attribute `key` on `span`.
    pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.to_string())
    }
}
