//! Per-component instrumentation facade.
//!
//! An [`Instrumentation`] owns one span emitter and one metric emitter bound
//! to a (component, version) pair, plus name-keyed caches of the counters and
//! histograms it has created. Lifecycle is `Active -> Disposed`; once disposed
//! every operation fails with [`TelemetryError::InstrumentNotInitialized`].

use std::sync::{Arc, PoisonError, RwLock};

use opentelemetry::trace::SpanKind;
use opentelemetry::{Context, KeyValue};

use super::cache::InstrumentCache;
use super::emitter::{
    scope, CounterHandle, CounterInstrument, HistogramHandle, HistogramInstrument,
    InstrumentDescriptor, MetricEmitter, OtelMetricEmitter, OtelSpanEmitter, Span, SpanEmitter,
    SpanRequest,
};
use crate::error::{Result, TelemetryError};
use crate::trace_context;

/// Version used when a component does not name one.
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_COUNTER_UNIT: &str = "1";
pub const DEFAULT_COUNTER_DESCRIPTION: &str = "counter";
pub const DEFAULT_HISTOGRAM_UNIT: &str = "ms";
pub const DEFAULT_HISTOGRAM_DESCRIPTION: &str = "histogram";
/// Description of histograms created implicitly by [`Instrumentation::record_duration`].
pub const DEFAULT_DURATION_DESCRIPTION: &str = "duration in ms";
/// Linked tokens are mirrored as `linked_activity_0`, `linked_activity_1`, ...
pub const LINKED_ACTIVITY_KEY_PREFIX: &str = "linked_activity_";

/// Options applied when an instrument is first created.
///
/// Ignored on later lookups of the same name: the first registration wins.
#[derive(Debug, Clone, Default)]
pub struct InstrumentOptions {
    unit: Option<String>,
    description: Option<String>,
    tags: Vec<KeyValue>,
}

impl InstrumentOptions {
    /// Options that fall back to the instrument kind's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Override the default description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Tags merged into every measurement of the instrument.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = KeyValue>) -> Self {
        self.tags.extend(tags);
        self
    }

    fn into_descriptor(
        self,
        name: &str,
        default_unit: &str,
        default_description: &str,
    ) -> InstrumentDescriptor {
        InstrumentDescriptor {
            name: name.to_string(),
            unit: self.unit.unwrap_or_else(|| default_unit.to_string()),
            description: self
                .description
                .unwrap_or_else(|| default_description.to_string()),
            tags: self.tags,
        }
    }
}

#[derive(Debug)]
struct Emitters {
    spans: Arc<dyn SpanEmitter>,
    metrics: Arc<dyn MetricEmitter>,
}

/// Span and metric entry point for one logical component.
#[derive(Debug)]
pub struct Instrumentation {
    component: String,
    version: String,
    emitters: RwLock<Option<Emitters>>,
    counters: InstrumentCache<String, dyn CounterInstrument>,
    histograms: InstrumentCache<String, dyn HistogramInstrument>,
}

impl Instrumentation {
    /// Create a facade bound to the globally installed OpenTelemetry providers.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidArgument`] if `component` is empty.
    pub fn new(component: &str, version: Option<&str>) -> Result<Self> {
        let version = version.unwrap_or(DEFAULT_VERSION);
        let scope = scope(component, version);
        Self::with_emitters(
            component,
            Some(version),
            Arc::new(OtelSpanEmitter::new(scope.clone())),
            Arc::new(OtelMetricEmitter::new(scope)),
        )
    }

    /// Create a facade over explicit emitters.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidArgument`] if `component` is empty.
    pub fn with_emitters(
        component: &str,
        version: Option<&str>,
        spans: Arc<dyn SpanEmitter>,
        metrics: Arc<dyn MetricEmitter>,
    ) -> Result<Self> {
        if component.is_empty() {
            return Err(TelemetryError::empty("component"));
        }

        let version = version.unwrap_or(DEFAULT_VERSION);
        tracing::debug!(component, version, "Instrumentation created");

        Ok(Self {
            component: component.to_string(),
            version: version.to_string(),
            emitters: RwLock::new(Some(Emitters { spans, metrics })),
            counters: InstrumentCache::new(),
            histograms: InstrumentCache::new(),
        })
    }

    /// Component name this facade reports under.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Component version, [`DEFAULT_VERSION`] when none was given.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The span emitter owned by this facade.
    pub fn tracer(&self) -> Result<Arc<dyn SpanEmitter>> {
        self.with_active(|emitters| Arc::clone(&emitters.spans))
    }

    /// The metric emitter owned by this facade.
    pub fn meter(&self) -> Result<Arc<dyn MetricEmitter>> {
        self.with_active(|emitters| Arc::clone(&emitters.metrics))
    }

    /// Start a span of `kind` as a child of the ambient current span.
    ///
    /// `tags` become span attributes at creation. Returns `Ok(None)` when the
    /// span is sampled out or tracing is disabled.
    pub fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        tags: &[KeyValue],
    ) -> Result<Option<Span>> {
        validate_span_name(name)?;

        let mut request = SpanRequest::new(name, kind);
        request.attributes = tags.to_vec();
        self.start(request)
    }

    /// Like [`start_span`](Self::start_span), but fails with
    /// [`TelemetryError::SpanCreationFailed`] instead of returning `None`.
    pub fn start_span_required(
        &self,
        name: &str,
        kind: SpanKind,
        tags: &[KeyValue],
    ) -> Result<Span> {
        self.start_span(name, kind, tags)?
            .ok_or_else(|| TelemetryError::SpanCreationFailed {
                name: name.to_string(),
            })
    }

    /// Start a span linked to the serialized trace contexts in `linked`.
    ///
    /// The parent is still the ambient current span; links are additive.
    /// Malformed tokens are skipped. Every token, parsed or not, is kept as a
    /// `linked_activity_<i>` attribute; explicit `tags` win on key clashes.
    /// Pass `&[]` when there is nothing to link.
    pub fn start_linked_span(
        &self,
        name: &str,
        linked: &[&str],
        kind: SpanKind,
        tags: &[KeyValue],
    ) -> Result<Option<Span>> {
        validate_span_name(name)?;

        let parsed = trace_context::parse_links(linked);
        if !parsed.skipped.is_empty() {
            tracing::debug!(
                span = name,
                skipped = parsed.skipped.len(),
                linked = linked.len(),
                "Some linked trace contexts were malformed"
            );
        }

        let mut attributes: Vec<KeyValue> = linked
            .iter()
            .enumerate()
            .map(|(i, token)| {
                KeyValue::new(
                    format!("{LINKED_ACTIVITY_KEY_PREFIX}{i}"),
                    token.to_string(),
                )
            })
            .collect();
        for tag in tags {
            attributes.retain(|kv| kv.key != tag.key);
            attributes.push(tag.clone());
        }

        let mut request = SpanRequest::new(name, kind);
        request.attributes = attributes;
        request.links = parsed.links;
        self.start(request)
    }

    /// Start a [`SpanKind::Server`] span.
    pub fn start_server_span(&self, name: &str, tags: &[KeyValue]) -> Result<Option<Span>> {
        self.start_span(name, SpanKind::Server, tags)
    }

    /// Start a [`SpanKind::Client`] span.
    pub fn start_client_span(&self, name: &str, tags: &[KeyValue]) -> Result<Option<Span>> {
        self.start_span(name, SpanKind::Client, tags)
    }

    /// Start a [`SpanKind::Internal`] span.
    pub fn start_internal_span(&self, name: &str, tags: &[KeyValue]) -> Result<Option<Span>> {
        self.start_span(name, SpanKind::Internal, tags)
    }

    /// Start a linked [`SpanKind::Server`] span.
    pub fn start_linked_server_span(
        &self,
        name: &str,
        linked: &[&str],
        tags: &[KeyValue],
    ) -> Result<Option<Span>> {
        self.start_linked_span(name, linked, SpanKind::Server, tags)
    }

    /// Start a linked [`SpanKind::Client`] span.
    pub fn start_linked_client_span(
        &self,
        name: &str,
        linked: &[&str],
        tags: &[KeyValue],
    ) -> Result<Option<Span>> {
        self.start_linked_span(name, linked, SpanKind::Client, tags)
    }

    /// Start a linked [`SpanKind::Internal`] span.
    pub fn start_linked_internal_span(
        &self,
        name: &str,
        linked: &[&str],
        tags: &[KeyValue],
    ) -> Result<Option<Span>> {
        self.start_linked_span(name, linked, SpanKind::Internal, tags)
    }

    /// Return the counter named `name`, creating it on first use.
    ///
    /// `options` only apply to the call that creates the counter.
    pub fn get_counter(&self, name: &str, options: InstrumentOptions) -> Result<CounterHandle> {
        self.counter(name, options, DEFAULT_COUNTER_DESCRIPTION)
    }

    /// Return the histogram named `name`, creating it on first use.
    ///
    /// `options` only apply to the call that creates the histogram.
    pub fn get_histogram(
        &self,
        name: &str,
        options: InstrumentOptions,
    ) -> Result<HistogramHandle> {
        self.histogram(name, options, DEFAULT_HISTOGRAM_DESCRIPTION)
    }

    /// Add `value` to the counter `name`. Negative values are passed through.
    pub fn increase_counter(&self, name: &str, tags: &[KeyValue], value: i64) -> Result<()> {
        let counter = self.counter(name, InstrumentOptions::new(), DEFAULT_COUNTER_DESCRIPTION)?;
        counter.add(value, tags);
        Ok(())
    }

    /// Record `value` (in the histogram's unit, milliseconds by default).
    pub fn record_duration(&self, name: &str, value: i64, tags: &[KeyValue]) -> Result<()> {
        let histogram =
            self.histogram(name, InstrumentOptions::new(), DEFAULT_DURATION_DESCRIPTION)?;
        histogram.record(value, tags);
        Ok(())
    }

    /// Release both emitters and clear the instrument caches.
    ///
    /// Calling this more than once is a no-op.
    pub fn dispose(&self) {
        let released = self
            .emitters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if released.is_some() {
            self.counters.clear();
            self.histograms.clear();
            tracing::debug!(
                component = %self.component,
                version = %self.version,
                "Instrumentation disposed"
            );
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.emitters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn start(&self, request: SpanRequest) -> Result<Option<Span>> {
        self.with_active(|emitters| emitters.spans.start(request, &Context::current()))
    }

    fn counter(
        &self,
        name: &str,
        options: InstrumentOptions,
        default_description: &str,
    ) -> Result<CounterHandle> {
        validate_instrument_name(name)?;
        self.with_active(|emitters| {
            self.counters.get_or_create(name.to_string(), || {
                let descriptor =
                    options.into_descriptor(name, DEFAULT_COUNTER_UNIT, default_description);
                tracing::debug!(component = %self.component, counter = name, "Creating counter");
                emitters.metrics.create_counter(descriptor)
            })
        })
    }

    fn histogram(
        &self,
        name: &str,
        options: InstrumentOptions,
        default_description: &str,
    ) -> Result<HistogramHandle> {
        validate_instrument_name(name)?;
        self.with_active(|emitters| {
            self.histograms.get_or_create(name.to_string(), || {
                let descriptor =
                    options.into_descriptor(name, DEFAULT_HISTOGRAM_UNIT, default_description);
                tracing::debug!(component = %self.component, histogram = name, "Creating histogram");
                emitters.metrics.create_histogram(descriptor)
            })
        })
    }

    /// Run `f` against the emitters while holding the state lock, so a
    /// concurrent `dispose` cannot interleave with it.
    fn with_active<R>(&self, f: impl FnOnce(&Emitters) -> R) -> Result<R> {
        let state = self.emitters.read().unwrap_or_else(PoisonError::into_inner);
        match state.as_ref() {
            Some(emitters) => Ok(f(emitters)),
            None => Err(TelemetryError::InstrumentNotInitialized {
                component: self.component.clone(),
            }),
        }
    }
}

fn validate_span_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TelemetryError::empty("name"));
    }
    Ok(())
}

fn validate_instrument_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TelemetryError::empty("instrument name"));
    }
    Ok(())
}
