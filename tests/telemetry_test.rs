//! Integration tests for telemetry initialization and span helpers.

use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt as _};

use workq::model::{WorkId, WorkState};
use workq::telemetry::work::{record_state_transition, start_work_span};
use workq::telemetry::{TelemetryConfig, init_telemetry};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; an Err here
    // means another test already installed one.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "workq-test".to_string(),
        log_level: "debug".to_string(),
    };
    let _guard = init_telemetry(config);
}

#[test]
fn telemetry_rejects_bad_log_level() {
    // RUST_LOG takes precedence over the configured level.
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "workq-test".to_string(),
        log_level: "workq=notalevel".to_string(),
    };
    assert!(init_telemetry(config).is_err());
}

#[test]
fn work_span_creates_and_records_transitions() {
    let id = WorkId::new();
    let span = start_work_span(&id, Some("resize-images"));
    record_state_transition(&span, WorkState::Queued, WorkState::Admitted);
    record_state_transition(&span, WorkState::Admitted, WorkState::Running);
    record_state_transition(&span, WorkState::Running, WorkState::Completed);
}

/// Collects every value written to `work.state`, in order.
#[derive(Clone, Default)]
struct StateRecorder {
    states: Arc<Mutex<Vec<String>>>,
}

impl Visit for StateRecorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "work.state" {
            self.states.lock().unwrap().push(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S: tracing::Subscriber> Layer<S> for StateRecorder {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        attrs.record(&mut self.clone());
    }

    fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        values.record(&mut self.clone());
    }
}

#[test]
fn work_span_starts_queued_and_follows_transitions() {
    let recorder = StateRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());

    tracing::subscriber::with_default(subscriber, || {
        let span = start_work_span(&WorkId::new(), None);
        record_state_transition(&span, WorkState::Queued, WorkState::Admitted);
        record_state_transition(&span, WorkState::Admitted, WorkState::Running);
    });

    let states = recorder.states.lock().unwrap().clone();
    assert_eq!(states, vec!["queued", "admitted", "running"]);
}
