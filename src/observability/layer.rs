//! Bridge from `tracing` to the asynchronous sink.
//!
//! Every event becomes one [`LogRecord`]. For each span around the event,
//! from the root down, the handle is narrowed with `with_group(span name)`
//! followed by `with_attrs(span fields)`, so
//!
//! ```text
//! info_span!("request", id = 7).in_scope(|| info!(status = 200, "done"))
//! ```
//!
//! renders as `{"msg":"done","request":{"id":7,"status":200}}` with the JSON writer.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{span, Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::sink::{AsyncSink, Attr, Level, LogRecord, Value};

/// `tracing_subscriber` layer that submits events to an [`AsyncSink`].
#[derive(Debug, Clone)]
pub struct SinkLayer {
    sink: AsyncSink,
}

impl SinkLayer {
    pub fn new(sink: AsyncSink) -> Self {
        Self { sink }
    }
}

/// Span fields, kept in the span's extensions.
struct SpanFields(Vec<Attr>);

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    attrs: Vec<Attr>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.attrs.push(Attr::new(field.name(), value));
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::Uint(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::Str(format!("{:?}", value)));
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.attrs));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldCollector::default();
        values.record(&mut fields);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(SpanFields(existing)) => existing.extend(fields.attrs),
            None => extensions.insert(SpanFields(fields.attrs)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        let record = LogRecord::new(
            Level::from(metadata.level()),
            fields.message.unwrap_or_default(),
        )
        .with_target(metadata.target())
        .with_attrs(fields.attrs);

        let Some(spans) = ctx.event_scope(event) else {
            self.sink.submit(record);
            return;
        };

        let mut sink = self.sink.clone();
        for span in spans.from_root() {
            sink = sink.with_group(span.name());
            if let Some(SpanFields(attrs)) = span.extensions().get::<SpanFields>() {
                sink = sink.with_attrs(attrs.iter().cloned());
            }
        }
        sink.submit(record);
    }
}
