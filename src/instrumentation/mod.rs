//! Instrumentation facade, its factory and the emitter seams underneath.

mod cache;
mod emitter;
mod facade;
mod factory;

pub use cache::InstrumentCache;
pub use emitter::{
    scope, CounterHandle, CounterInstrument, HistogramHandle, HistogramInstrument,
    InstrumentDescriptor, MetricEmitter, OtelMetricEmitter, OtelSpanEmitter, Span, SpanEmitter,
    SpanRequest,
};
pub use facade::{
    InstrumentOptions, Instrumentation, DEFAULT_COUNTER_DESCRIPTION, DEFAULT_COUNTER_UNIT,
    DEFAULT_DURATION_DESCRIPTION, DEFAULT_HISTOGRAM_DESCRIPTION, DEFAULT_HISTOGRAM_UNIT,
    DEFAULT_VERSION, LINKED_ACTIVITY_KEY_PREFIX,
};
pub use factory::InstrumentationFactory;
