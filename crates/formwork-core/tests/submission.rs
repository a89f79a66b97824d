#![forbid(unsafe_code)]

//! Submission gating, payloads and handler actions.

mod common;

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use common::signup_form;
use formwork_core::{
    FieldOptions, FormConfig, FormContext, InvalidSubmission, Schema, SchemaResult, SubmitEvent,
    SubmitOutcome, SubmitTrigger,
};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};

#[derive(Default)]
struct RecordingEvent {
    prevented: Cell<bool>,
    stopped: Cell<bool>,
}

impl SubmitEvent for RecordingEvent {
    fn prevent_default(&self) {
        self.prevented.set(true);
    }

    fn stop_propagation(&self) {
        self.stopped.set(true);
    }
}

/// Always valid; trims every top-level string.
struct TrimSchema;

impl Schema for TrimSchema {
    fn validate<'a>(&'a self, values: &'a Value) -> LocalBoxFuture<'a, SchemaResult> {
        let mut trimmed = values.clone();
        if let Value::Object(map) = &mut trimmed {
            for value in map.values_mut() {
                if let Value::String(s) = value {
                    *s = s.trim().to_string();
                }
            }
        }
        futures::future::ready(SchemaResult::from_errors(Vec::new()).with_values(trimmed))
            .boxed_local()
    }
}

fn register_signup(form: &FormContext) {
    form.register_field(FieldOptions::new("email"));
    form.register_field(
        FieldOptions::new("agree")
            .checkbox(json!(true))
            .with_unchecked_value(json!(false)),
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_forms_never_reach_the_handler() {
    let form = signup_form();
    register_signup(&form);
    let called = Rc::new(Cell::new(0));
    let invalid = Rc::new(RefCell::new(None::<InvalidSubmission>));

    let handler = {
        let called = Rc::clone(&called);
        let invalid = Rc::clone(&invalid);
        form.handle_submit(move |_values, _actions| {
            called.set(called.get() + 1);
            async { Ok::<(), Infallible>(()) }
        })
        .on_invalid(move |submission| *invalid.borrow_mut() = Some(submission))
    };

    let outcome = handler.submit(SubmitTrigger::Direct).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Invalid);
    assert_eq!(called.get(), 0);
    assert_eq!(form.submit_count(), 1);
    assert!(!form.is_submitting());
    assert!(form.meta().touched);
    let invalid = invalid.borrow();
    let submission = invalid.as_ref().unwrap();
    assert_eq!(submission.errors.len(), 2);
    assert_eq!(submission.values, json!({"email": "", "agree": false}));
    assert_eq!(form.errors(), submission.errors);
}

#[tokio::test(start_paused = true)]
async fn valid_forms_submit_once_with_values() {
    let form = signup_form();
    register_signup(&form);
    form.set_field_value("email", json!("a@b.co"));
    form.set_field_value("agree", json!(true));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let submitting_inside = Rc::new(Cell::new(false));
    let handler = {
        let seen = Rc::clone(&seen);
        let submitting_inside = Rc::clone(&submitting_inside);
        form.handle_submit(move |values, actions| {
            seen.borrow_mut().push(values);
            submitting_inside.set(actions.form().is_submitting());
            async { Ok::<(), Infallible>(()) }
        })
    };

    let outcome = handler.submit(SubmitTrigger::Direct).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Submitted);
    assert_eq!(*seen.borrow(), vec![json!({"email": "a@b.co", "agree": true})]);
    assert!(submitting_inside.get());
    assert!(!form.is_submitting());
    assert_eq!(form.submit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn events_are_stopped() {
    let form = FormContext::default();
    let event = Rc::new(RecordingEvent::default());
    let handler = form.handle_submit(|_, _| async { Ok::<(), Infallible>(()) });

    handler
        .submit(SubmitTrigger::Event(event.clone()))
        .await
        .unwrap();

    assert!(event.prevented.get());
    assert!(event.stopped.get());
}

#[tokio::test(start_paused = true)]
async fn handler_errors_propagate() {
    let form = FormContext::default();
    let handler = form.handle_submit(|_, _| async { Err::<(), String>("server down".into()) });

    let result = handler.submit(SubmitTrigger::Direct).await;

    assert_eq!(result, Err("server down".to_string()));
    assert!(!form.is_submitting());
    assert_eq!(form.submit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn controlled_submission_drops_unregistered_values() {
    let form = FormContext::new(
        FormConfig::default().with_initial_values(json!({"name": "ada", "internal": 7, "q": "x"})),
    );
    form.register_field(FieldOptions::new("name"));
    let _query = form.bind("q");

    let seen = Rc::new(RefCell::new(None));
    let handler = {
        let seen = Rc::clone(&seen);
        form.handle_submit_controlled(move |values, actions| {
            assert_eq!(&values, actions.controlled_values());
            *seen.borrow_mut() = Some(values);
            async { Ok::<(), Infallible>(()) }
        })
    };
    handler.submit(SubmitTrigger::Direct).await.unwrap();

    assert_eq!(*seen.borrow(), Some(json!({"name": "ada", "q": "x"})));
}

#[tokio::test(start_paused = true)]
async fn coerced_schema_values_are_submitted() {
    let form = FormContext::new(
        FormConfig::default()
            .with_initial_values(json!({"name": "  ada  "}))
            .with_schema(TrimSchema),
    );
    form.register_field(FieldOptions::new("name"));

    let seen = Rc::new(RefCell::new(None));
    let handler = {
        let seen = Rc::clone(&seen);
        form.handle_submit(move |values, _| {
            *seen.borrow_mut() = Some(values);
            async { Ok::<(), Infallible>(()) }
        })
    };
    handler.submit(SubmitTrigger::Direct).await.unwrap();

    assert_eq!(*seen.borrow(), Some(json!({"name": "ada"})));
    assert_eq!(form.value_at("name"), Some(json!("  ada  ")));
}

#[tokio::test(start_paused = true)]
async fn controlled_submission_projects_coerced_values() {
    let form = FormContext::new(
        FormConfig::default()
            .with_initial_values(json!({"name": " ada ", "internal": 7}))
            .with_schema(TrimSchema),
    );
    form.register_field(FieldOptions::new("name"));

    let seen = Rc::new(RefCell::new(None));
    let handler = {
        let seen = Rc::clone(&seen);
        form.handle_submit_controlled(move |values, actions| {
            assert_eq!(&values, actions.controlled_values());
            *seen.borrow_mut() = Some(values);
            async { Ok::<(), Infallible>(()) }
        })
    };
    handler.submit(SubmitTrigger::Direct).await.unwrap();

    let seen = seen.borrow();
    let values = seen.as_ref().unwrap();
    assert_eq!(values, &json!({"name": "ada"}));
    assert_eq!(values.get("internal"), None);
}

#[tokio::test(start_paused = true)]
async fn handlers_can_report_server_errors() {
    let form = FormContext::new(FormConfig::default().with_initial_values(json!({"email": "a@b.co"})));
    let email = form.register_field(FieldOptions::new("email"));
    let handler = form.handle_submit(|_, actions| {
        actions.set_field_error("email", Some("Already registered".into()));
        async { Ok::<(), Infallible>(()) }
    });

    handler.submit(SubmitTrigger::Direct).await.unwrap();

    assert_eq!(email.error_message().as_deref(), Some("Already registered"));
    assert!(!form.meta().valid);
}
