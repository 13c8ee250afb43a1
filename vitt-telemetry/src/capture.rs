//! In-memory event capture.
//!
//! [`CaptureLayer`] stores every event it sees in a shared
//! [`CapturedEvents`] buffer. Install it for the scope of a test with
//! [`tracing::subscriber::set_default`] and inspect the buffer afterwards.
//!
//! ```rust
//! use vitt_telemetry::capture;
//!
//! let (subscriber, events) = capture::subscriber();
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::warn!(index = "filings", "dimension mismatch");
//! });
//! assert!(events.contains(tracing::Level::WARN, "dimension mismatch"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// One recorded event.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    /// The event's `message` field, or `""` if it had none.
    pub message: String,
    /// Every other field, keyed by name.
    pub fields: HashMap<String, Value>,
}

impl CapturedEvent {
    /// Whether this event was logged at `level`.
    pub fn is(&self, level: Level) -> bool {
        self.level == level.as_str()
    }
}

/// Shared buffer of captured events. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CapturedEvents {
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of everything captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events logged at `level`.
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.is(level)).collect()
    }

    /// Whether an event at `level` has a message containing `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.at_level(level).iter().any(|e| e.message.contains(needle))
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// A tracing layer that records events into [`CapturedEvents`].
pub struct CaptureLayer {
    events: CapturedEvents,
}

impl CaptureLayer {
    pub fn new(events: CapturedEvents) -> Self {
        Self { events }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;
        let message = match fields.remove("message") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let metadata = event.metadata();
        self.events.push(CapturedEvent {
            level: metadata.level().as_str().to_string(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

/// A registry with only a [`CaptureLayer`], plus its buffer.
pub fn subscriber() -> (impl Subscriber + Send + Sync, CapturedEvents) {
    let events = CapturedEvents::new();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(events.clone()));
    (subscriber, events)
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, Value>);

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
