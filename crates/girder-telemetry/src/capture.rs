//! In-memory log capture for asserting logged side effects in tests.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// One captured log event.
#[derive(Clone, Debug)]
pub struct CapturedLog {
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Shared buffer the capture layer appends to.
#[derive(Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CapturedLog> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// True if any record at `level` has `needle` in its message.
    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.inner
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    fn push(&self, record: CapturedLog) {
        self.inner.lock().push(record);
    }
}

/// Visitor that extracts the message and remaining fields from an event.
struct FieldVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: serde_json::Map::new(),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let val = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(val),
            name => {
                self.fields
                    .insert(name.to_string(), serde_json::Value::String(val));
            }
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            name => {
                self.fields.insert(
                    name.to_string(),
                    serde_json::Value::String(value.to_string()),
                );
            }
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// tracing Layer that records every event into a [`LogBuffer`].
pub struct CaptureLayer {
    buffer: LogBuffer,
}

impl CaptureLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        self.buffer.push(CapturedLog {
            level: event.metadata().level().to_string().to_uppercase(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        });
    }
}

/// A subscriber that only captures, for use with
/// `tracing::subscriber::with_default` in tests.
pub fn capture_subscriber(buffer: &LogBuffer) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry().with(CaptureLayer::new(buffer.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_message_and_level() {
        let buffer = LogBuffer::new();
        tracing::subscriber::with_default(capture_subscriber(&buffer), || {
            tracing::warn!("engine went away");
        });

        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "WARN");
        assert_eq!(records[0].message, "engine went away");
    }

    #[test]
    fn captures_structured_fields() {
        let buffer = LogBuffer::new();
        tracing::subscriber::with_default(capture_subscriber(&buffer), || {
            tracing::error!(closed = 3u64, reason = "drain", "pool shut down");
        });

        let records = buffer.records();
        assert_eq!(records[0].fields.get("closed"), Some(&serde_json::json!(3)));
        assert_eq!(
            records[0].fields.get("reason"),
            Some(&serde_json::json!("drain"))
        );
        assert!(buffer.contains("ERROR", "pool shut down"));
    }

    #[test]
    fn clear_empties_the_buffer() {
        let buffer = LogBuffer::new();
        tracing::subscriber::with_default(capture_subscriber(&buffer), || {
            tracing::info!("one");
        });
        assert!(!buffer.is_empty());
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
