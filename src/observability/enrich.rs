//! Trace context enrichment for log events.
//!
//! Events logged while an OpenTelemetry span is current carry its
//! `trace_id`, `span_id`, `trace_flags` and `traceparent`. The span can be
//! attached directly or activated by entering a bridged `tracing` span.

use std::fmt::{self, Write as _};

use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Context;
use serde_json::Value;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::trace_context;

/// Event formatter that appends the current trace context to `inner`'s output.
///
/// Text lines end with `key=value` pairs; JSON objects get top-level keys.
/// Events outside any valid span context are passed through untouched.
#[derive(Debug, Clone)]
pub struct TraceContextFormat<E> {
    inner: E,
    json: bool,
}

impl<E> TraceContextFormat<E> {
    /// Enrich a text event formatter.
    pub fn text(inner: E) -> Self {
        Self { inner, json: false }
    }

    /// Enrich a JSON event formatter.
    pub fn json(inner: E) -> Self {
        Self { inner, json: true }
    }
}

impl<S, N, E> FormatEvent<S, N> for TraceContextFormat<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let cx = Context::current();
        let span_context = cx.span().span_context().clone();
        if !span_context.is_valid() {
            return self.inner.format_event(ctx, writer, event);
        }

        let mut line = String::new();
        self.inner.format_event(ctx, Writer::new(&mut line), event)?;

        let fields = trace_fields(&span_context);
        if self.json {
            write_json(&mut writer, &line, &fields)
        } else {
            write_text(&mut writer, &line, &fields)
        }
    }
}

/// Log field names and values describing `span_context`.
pub fn trace_fields(span_context: &SpanContext) -> [(&'static str, String); 4] {
    [
        ("trace_id", span_context.trace_id().to_string()),
        ("span_id", span_context.span_id().to_string()),
        (
            "trace_flags",
            format!("{:02x}", span_context.trace_flags().to_u8()),
        ),
        ("traceparent", trace_context::format(span_context)),
    ]
}

fn write_text(writer: &mut Writer<'_>, line: &str, fields: &[(&str, String)]) -> fmt::Result {
    writer.write_str(line.trim_end_matches('\n'))?;
    for (key, value) in fields {
        write!(writer, " {key}={value}")?;
    }
    writeln!(writer)
}

fn write_json(writer: &mut Writer<'_>, line: &str, fields: &[(&str, String)]) -> fmt::Result {
    // Keep the line as-is if the inner formatter did not produce an object
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(line) else {
        return writer.write_str(line);
    };
    for (key, value) in fields {
        object.insert((*key).to_string(), Value::String(value.clone()));
    }
    let encoded = serde_json::to_string(&object).map_err(|_| fmt::Error)?;
    writeln!(writer, "{encoded}")
}
