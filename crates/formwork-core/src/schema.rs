#![forbid(unsafe_code)]

//! Validation contracts consumed by the form.
//!
//! Two shapes are supported:
//!
//! - per field: a [`FieldRules`] implementation attached through
//!   [`FieldOptions::with_rules`](crate::config::FieldOptions::with_rules);
//! - per form: a [`Schema`] that validates the whole value tree at once and
//!   returns per-path message lists. [`RuleMap`] adapts a map of path to
//!   [`FieldRules`] into a `Schema`.
//!
//! Messages are produced here and passed through the form untouched.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use indexmap::IndexMap;
use serde_json::Value;

use crate::path;
use crate::rules::Validator;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Outcome of validating a whole value tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaResult {
    pub valid: bool,
    /// Messages per path. Paths without messages may be omitted.
    pub errors: IndexMap<String, Vec<String>>,
    /// Coerced values, when the schema produces them. Submission hands these
    /// to the success handler instead of the raw tree.
    pub values: Option<Value>,
}

impl SchemaResult {
    /// Build a result from per-path messages; valid iff every list is empty.
    /// Empty lists are dropped.
    #[must_use]
    pub fn from_errors(errors: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let errors: IndexMap<String, Vec<String>> = errors
            .into_iter()
            .filter(|(_, messages)| !messages.is_empty())
            .collect();
        Self {
            valid: errors.is_empty(),
            errors,
            values: None,
        }
    }

    #[must_use]
    pub fn with_values(mut self, values: Value) -> Self {
        self.values = Some(values);
        self
    }
}

/// Whole-form validator.
pub trait Schema {
    fn validate<'a>(&'a self, values: &'a Value) -> LocalBoxFuture<'a, SchemaResult>;

    /// Coerce or default a value tree before it becomes the form's initial
    /// values. `None` means the schema does not cast.
    fn cast(&self, _values: &Value) -> Option<Value> {
        None
    }
}

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

/// What a rule knows about the field it checks.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleContext {
    pub path: String,
    pub label: Option<String>,
    /// Snapshot of the whole form at the time of the run.
    pub form_values: Value,
}

impl RuleContext {
    /// Label if set, otherwise the path.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.path)
    }
}

/// Per-field validation. Returns the messages for `value`; empty means valid.
pub trait FieldRules {
    fn validate<'a>(&'a self, value: &'a Value, ctx: &'a RuleContext)
    -> LocalBoxFuture<'a, Vec<String>>;
}

/// An ordered list of synchronous [`Validator`]s.
///
/// By default the list bails at the first failure. `{field}` in messages is
/// replaced by the field label (or path).
#[derive(Default)]
pub struct Rules {
    validators: Vec<Box<dyn Validator>>,
    collect_all: bool,
}

impl Rules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Report every failing rule instead of stopping at the first.
    #[must_use]
    pub fn collect_all(mut self) -> Self {
        self.collect_all = true;
        self
    }

    /// Run synchronously.
    #[must_use]
    pub fn check(&self, value: &Value, ctx: &RuleContext) -> Vec<String> {
        let mut messages = Vec::new();
        for validator in &self.validators {
            if let Some(err) = validator.validate(value).error() {
                let err = err.clone().with_default_param("field", ctx.display_name());
                messages.push(err.format_message());
                if !self.collect_all {
                    break;
                }
            }
        }
        messages
    }
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("validators", &self.validators.len())
            .field("collect_all", &self.collect_all)
            .finish()
    }
}

impl FieldRules for Rules {
    fn validate<'a>(
        &'a self,
        value: &'a Value,
        ctx: &'a RuleContext,
    ) -> LocalBoxFuture<'a, Vec<String>> {
        future::ready(self.check(value, ctx)).boxed_local()
    }
}

/// Closure rule; see [`rule_fn`].
pub struct RuleFn<F>(F);

/// A synchronous rule from a closure returning `Err(message)` on failure.
pub fn rule_fn<F>(f: F) -> RuleFn<F>
where
    F: Fn(&Value, &RuleContext) -> Result<(), String>,
{
    RuleFn(f)
}

impl<F> FieldRules for RuleFn<F>
where
    F: Fn(&Value, &RuleContext) -> Result<(), String>,
{
    fn validate<'a>(
        &'a self,
        value: &'a Value,
        ctx: &'a RuleContext,
    ) -> LocalBoxFuture<'a, Vec<String>> {
        let messages = (self.0)(value, ctx).err().into_iter().collect();
        future::ready(messages).boxed_local()
    }
}

/// Async closure rule; see [`async_rule`].
pub struct AsyncRule<F>(F);

/// An asynchronous rule (for example a server-side uniqueness check). The
/// closure receives owned copies of the value and context.
pub fn async_rule<F, Fut>(f: F) -> AsyncRule<F>
where
    F: Fn(Value, RuleContext) -> Fut,
    Fut: Future<Output = Result<(), String>> + 'static,
{
    AsyncRule(f)
}

impl<F, Fut> FieldRules for AsyncRule<F>
where
    F: Fn(Value, RuleContext) -> Fut,
    Fut: Future<Output = Result<(), String>> + 'static,
{
    fn validate<'a>(
        &'a self,
        value: &'a Value,
        ctx: &'a RuleContext,
    ) -> LocalBoxFuture<'a, Vec<String>> {
        let pending = (self.0)(value.clone(), ctx.clone());
        async move { pending.await.err().into_iter().collect() }.boxed_local()
    }
}

// ---------------------------------------------------------------------------
// RuleMap
// ---------------------------------------------------------------------------

/// Object-map-of-validators schema: each path is checked with its own rules.
/// Missing values are checked as `null`.
#[derive(Default, Clone)]
pub struct RuleMap {
    rules: IndexMap<String, Rc<dyn FieldRules>>,
    labels: IndexMap<String, String>,
}

impl RuleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rule(mut self, path: impl Into<String>, rules: impl FieldRules + 'static) -> Self {
        self.rules.insert(path.into(), Rc::new(rules));
        self
    }

    #[must_use]
    pub fn label(mut self, path: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(path.into(), label.into());
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

impl fmt::Debug for RuleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleMap")
            .field("paths", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Schema for RuleMap {
    fn validate<'a>(&'a self, values: &'a Value) -> LocalBoxFuture<'a, SchemaResult> {
        async move {
            let checks = self.rules.iter().map(|(path, rules)| async move {
                let value = path::get_in(values, path).cloned().unwrap_or(Value::Null);
                let ctx = RuleContext {
                    path: path.clone(),
                    label: self.labels.get(path).cloned(),
                    form_values: values.clone(),
                };
                (path.clone(), rules.validate(&value, &ctx).await)
            });
            SchemaResult::from_errors(future::join_all(checks).await)
        }
        .boxed_local()
    }
}
