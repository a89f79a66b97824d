#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use formwork_core::rules::{Accepted, Email, Required};
use formwork_core::{FormConfig, FormContext, RuleMap, Rules, Schema, SchemaResult};
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `email` required and well-formed, `agree` accepted.
pub fn signup_rules() -> RuleMap {
    RuleMap::new()
        .rule("email", Rules::new().with(Required::new()).with(Email::new()))
        .rule("agree", Rules::new().with(Accepted::new()))
}

pub fn signup_form() -> FormContext {
    init_tracing();
    FormContext::new(
        FormConfig::default()
            .with_initial_values(json!({"email": "", "agree": false}))
            .with_schema(signup_rules()),
    )
}

/// Wraps a schema and counts evaluations.
pub struct CountingSchema<S> {
    inner: S,
    runs: Rc<Cell<u32>>,
}

impl<S> CountingSchema<S> {
    pub fn new(inner: S) -> (Self, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        (
            Self {
                inner,
                runs: Rc::clone(&runs),
            },
            runs,
        )
    }
}

impl<S: Schema> Schema for CountingSchema<S> {
    fn validate<'a>(&'a self, values: &'a Value) -> LocalBoxFuture<'a, SchemaResult> {
        self.runs.set(self.runs.get() + 1);
        self.inner.validate(values)
    }
}
