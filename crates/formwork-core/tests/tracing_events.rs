#![forbid(unsafe_code)]

//! Structured log events emitted by the engine.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use formwork_core::{FieldOptions, FormContext, SubmitTrigger};
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    fields: HashMap<String, String>,
}

/// A tracing Layer that records every event.
struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.remove("message").unwrap_or_default();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}

fn capture() -> (tracing::subscriber::DefaultGuard, Arc<Mutex<Vec<CapturedEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = EventCapture {
        events: Arc::clone(&events),
    };
    let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
    (guard, events)
}

fn find(events: &Arc<Mutex<Vec<CapturedEvent>>>, message: &str) -> Option<CapturedEvent> {
    events
        .lock()
        .unwrap()
        .iter()
        .find(|e| e.message == message)
        .cloned()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn registration_logs_path_and_ids() {
    let (_guard, events) = capture();
    let form = FormContext::default();
    let field = form.register_field(FieldOptions::new("email"));

    let event = find(&events, "field registered").expect("registration event");
    assert_eq!(event.level, tracing::Level::DEBUG);
    assert_eq!(event.fields.get("path").map(String::as_str), Some("email"));
    assert_eq!(
        event.fields.get("field_id"),
        Some(&field.id().raw().to_string())
    );
}

#[test]
fn unknown_reset_warns() {
    let (_guard, events) = capture();
    let form = FormContext::default();
    form.reset_field("ghost", Default::default());

    let event = find(&events, "reset of unknown field ignored").expect("warning");
    assert_eq!(event.level, tracing::Level::WARN);
    assert_eq!(event.fields.get("path").map(String::as_str), Some("ghost"));
}

#[tokio::test(start_paused = true)]
async fn submission_logs_at_info() {
    let (_guard, events) = capture();
    let form = FormContext::new(
        formwork_core::FormConfig::default().with_initial_values(json!({"a": 1})),
    );
    form.register_field(FieldOptions::new("a"));
    let handler = form.handle_submit(|_, _| async { Ok::<(), Infallible>(()) });
    handler.submit(SubmitTrigger::Direct).await.unwrap();

    let event = find(&events, "form submitted").expect("submission event");
    assert_eq!(event.level, tracing::Level::INFO);
    assert_eq!(event.fields.get("count").map(String::as_str), Some("1"));
}
