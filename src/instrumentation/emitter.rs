//! Seams between the facade and the OpenTelemetry runtime.
//!
//! The facade never talks to a tracer or meter directly. It goes through
//! [`SpanEmitter`] and [`MetricEmitter`], which lets tests swap in recording
//! doubles while production code uses the OpenTelemetry-backed emitters.

use std::fmt;
use std::sync::Arc;

use opentelemetry::global::{self, BoxedSpan, BoxedTracer};
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::trace::{Link, Span as _, SpanKind, Tracer, TracerProvider};
use opentelemetry::{Context, InstrumentationScope, KeyValue};

/// A started span. Mutate it through [`opentelemetry::trace::Span`]; it ends
/// explicitly or when dropped.
pub type Span = BoxedSpan;

/// Everything needed to start one span.
#[derive(Debug, Clone)]
pub struct SpanRequest {
    pub name: String,
    pub kind: SpanKind,
    pub attributes: Vec<KeyValue>,
    pub links: Vec<Link>,
}

impl SpanRequest {
    pub fn new(name: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: Vec::new(),
            links: Vec::new(),
        }
    }
}

/// Starts spans for one instrumentation scope.
pub trait SpanEmitter: Send + Sync + fmt::Debug {
    /// Start a span as a child of `parent`.
    ///
    /// Returns `None` when tracing is disabled or the span is sampled out.
    fn start(&self, request: SpanRequest, parent: &Context) -> Option<Span>;
}

/// Name, unit, description and instrument-level tags of a metric instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentDescriptor {
    pub name: String,
    pub unit: String,
    pub description: String,
    pub tags: Vec<KeyValue>,
}

/// A counter handle. Values are passed through unchanged.
pub trait CounterInstrument: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &InstrumentDescriptor;
    fn add(&self, value: i64, tags: &[KeyValue]);
}

/// A histogram handle. Values are passed through unchanged.
pub trait HistogramInstrument: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &InstrumentDescriptor;
    fn record(&self, value: i64, tags: &[KeyValue]);
}

/// Shared counter handle as cached by the facade.
pub type CounterHandle = Arc<dyn CounterInstrument>;

/// Shared histogram handle as cached by the facade.
pub type HistogramHandle = Arc<dyn HistogramInstrument>;

/// Creates metric instruments for one instrumentation scope.
pub trait MetricEmitter: Send + Sync + fmt::Debug {
    fn create_counter(&self, descriptor: InstrumentDescriptor) -> CounterHandle;
    fn create_histogram(&self, descriptor: InstrumentDescriptor) -> HistogramHandle;
}

/// Build the instrumentation scope shared by both emitters of a component.
pub fn scope(component: &str, version: &str) -> InstrumentationScope {
    InstrumentationScope::builder(component.to_string())
        .with_version(version.to_string())
        .build()
}

/// [`SpanEmitter`] backed by an OpenTelemetry tracer.
pub struct OtelSpanEmitter {
    tracer: BoxedTracer,
}

impl OtelSpanEmitter {
    /// Bind to the globally installed tracer provider.
    pub fn new(scope: InstrumentationScope) -> Self {
        Self {
            tracer: global::tracer_provider().tracer_with_scope(scope),
        }
    }

    /// Bind to an explicit tracer provider.
    pub fn from_provider<P>(provider: &P, scope: InstrumentationScope) -> Self
    where
        P: TracerProvider,
        P::Tracer: Send + Sync + 'static,
        <P::Tracer as Tracer>::Span: Send + Sync + 'static,
    {
        Self {
            tracer: BoxedTracer::new(Box::new(provider.tracer_with_scope(scope))),
        }
    }
}

impl fmt::Debug for OtelSpanEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelSpanEmitter").finish_non_exhaustive()
    }
}

impl SpanEmitter for OtelSpanEmitter {
    fn start(&self, request: SpanRequest, parent: &Context) -> Option<Span> {
        let builder = self
            .tracer
            .span_builder(request.name)
            .with_kind(request.kind)
            .with_attributes(request.attributes)
            .with_links(request.links);
        let span = self.tracer.build_with_context(builder, parent);
        span.is_recording().then_some(span)
    }
}

/// [`MetricEmitter`] backed by an OpenTelemetry meter.
pub struct OtelMetricEmitter {
    meter: Meter,
}

impl fmt::Debug for OtelMetricEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelMetricEmitter").finish_non_exhaustive()
    }
}

impl OtelMetricEmitter {
    /// Bind to the globally installed meter provider.
    pub fn new(scope: InstrumentationScope) -> Self {
        Self {
            meter: global::meter_with_scope(scope),
        }
    }

    /// Bind to an explicit meter provider.
    pub fn from_provider<P: MeterProvider>(provider: &P, scope: InstrumentationScope) -> Self {
        Self {
            meter: provider.meter_with_scope(scope),
        }
    }
}

impl MetricEmitter for OtelMetricEmitter {
    fn create_counter(&self, descriptor: InstrumentDescriptor) -> CounterHandle {
        let counter = self
            .meter
            .u64_counter(descriptor.name.clone())
            .with_unit(descriptor.unit.clone())
            .with_description(descriptor.description.clone())
            .build();
        Arc::new(OtelCounter {
            descriptor,
            counter,
        })
    }

    fn create_histogram(&self, descriptor: InstrumentDescriptor) -> HistogramHandle {
        let histogram = self
            .meter
            .f64_histogram(descriptor.name.clone())
            .with_unit(descriptor.unit.clone())
            .with_description(descriptor.description.clone())
            .build();
        Arc::new(OtelHistogram {
            descriptor,
            histogram,
        })
    }
}

/// Instrument-level tags come first so per-call tags can override them.
fn merge_tags(base: &[KeyValue], extra: &[KeyValue]) -> Vec<KeyValue> {
    base.iter().chain(extra).cloned().collect()
}

struct OtelCounter {
    descriptor: InstrumentDescriptor,
    counter: Counter<u64>,
}

impl fmt::Debug for OtelCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelCounter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl CounterInstrument for OtelCounter {
    fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    fn add(&self, value: i64, tags: &[KeyValue]) {
        match u64::try_from(value) {
            Ok(value) => self
                .counter
                .add(value, &merge_tags(&self.descriptor.tags, tags)),
            Err(_) => tracing::warn!(
                counter = %self.descriptor.name,
                value,
                "Dropping negative delta for monotonic counter"
            ),
        }
    }
}

struct OtelHistogram {
    descriptor: InstrumentDescriptor,
    histogram: Histogram<f64>,
}

impl fmt::Debug for OtelHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelHistogram")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl HistogramInstrument for OtelHistogram {
    fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    fn record(&self, value: i64, tags: &[KeyValue]) {
        self.histogram
            .record(value as f64, &merge_tags(&self.descriptor.tags, tags));
    }
}
