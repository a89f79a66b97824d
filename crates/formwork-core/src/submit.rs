#![forbid(unsafe_code)]

//! Submission.
//!
//! A [`SubmitHandler`] wraps a success callback. Each call to
//! [`submit`](SubmitHandler::submit) stops the triggering event, touches
//! every field, raises `is_submitting`, bumps the submit count and runs a
//! force validation. A valid form calls the success handler; an invalid one
//! calls the optional invalid handler.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::form::{FormContext, FormResetState};
use crate::scheduler::FieldValidation;

/// Event that started a submission (for example a DOM-style submit event).
pub trait SubmitEvent {
    fn prevent_default(&self);
    fn stop_propagation(&self);
}

/// What started a submission.
#[derive(Clone, Default)]
pub enum SubmitTrigger {
    /// Called programmatically.
    #[default]
    Direct,
    Event(Rc<dyn SubmitEvent>),
}

impl fmt::Debug for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTrigger::Direct => f.write_str("Direct"),
            SubmitTrigger::Event(_) => f.write_str("Event(..)"),
        }
    }
}

impl SubmitTrigger {
    fn stop(&self) {
        if let SubmitTrigger::Event(event) = self {
            event.prevent_default();
            event.stop_propagation();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The form was valid and the success handler completed.
    Submitted,
    /// Validation failed; the success handler was not called.
    Invalid,
}

/// Passed to the invalid-submission handler.
#[derive(Debug, Clone)]
pub struct InvalidSubmission {
    pub values: Value,
    pub trigger: SubmitTrigger,
    pub errors: IndexMap<String, String>,
    pub results: IndexMap<String, FieldValidation>,
}

/// Passed to the success handler alongside the submitted values.
#[derive(Debug, Clone)]
pub struct SubmissionActions {
    form: FormContext,
    trigger: SubmitTrigger,
    controlled_values: Value,
}

impl SubmissionActions {
    #[must_use]
    pub fn trigger(&self) -> &SubmitTrigger {
        &self.trigger
    }

    /// Values limited to registered and bound paths.
    #[must_use]
    pub fn controlled_values(&self) -> &Value {
        &self.controlled_values
    }

    #[must_use]
    pub fn form(&self) -> &FormContext {
        &self.form
    }

    pub fn set_field_error(&self, path: &str, message: Option<String>) {
        self.form.set_field_error(path, message);
    }

    pub fn set_errors(&self, errors: IndexMap<String, Vec<String>>) {
        self.form.set_errors(errors);
    }

    pub fn set_field_value(&self, path: &str, value: Value) {
        self.form.set_field_value(path, value);
    }

    pub fn set_values(&self, values: Value) {
        self.form.set_values(values);
    }

    pub fn set_field_touched(&self, path: &str, touched: bool) {
        self.form.set_field_touched(path, touched);
    }

    pub fn set_touched(&self, touched: IndexMap<String, bool>) {
        self.form.set_touched(touched);
    }

    pub fn reset_form(&self, state: Option<FormResetState>) {
        self.form.reset_form(state);
    }
}

type InvalidHandler = Box<dyn Fn(InvalidSubmission)>;

/// Submission entry point built by [`FormContext::handle_submit`].
pub struct SubmitHandler<F> {
    form: FormContext,
    on_success: F,
    on_invalid: Option<InvalidHandler>,
    controlled_only: bool,
}

impl<F> fmt::Debug for SubmitHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitHandler")
            .field("form", &self.form.id())
            .field("on_invalid", &self.on_invalid.is_some())
            .field("controlled_only", &self.controlled_only)
            .finish()
    }
}

/// Keeps `is_submitting` raised for its lifetime.
struct SubmittingGuard<'a>(&'a FormContext);

impl<'a> SubmittingGuard<'a> {
    fn enter(form: &'a FormContext) -> Self {
        form.inner.submitting.set(true);
        form.inner
            .submit_count
            .set(form.inner.submit_count.get().saturating_add(1));
        Self(form)
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.inner.submitting.set(false);
    }
}

impl<F, Fut, E> SubmitHandler<F>
where
    F: Fn(Value, SubmissionActions) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    #[must_use]
    pub fn on_invalid(mut self, handler: impl Fn(InvalidSubmission) + 'static) -> Self {
        self.on_invalid = Some(Box::new(handler));
        self
    }

    /// Run one submission. Errors from the success handler are returned
    /// as-is after `is_submitting` drops.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, E> {
        trigger.stop();
        self.form.set_all_touched(true);
        let _submitting = SubmittingGuard::enter(&self.form);
        let count = self.form.submit_count();
        debug!(form_id = self.form.id().raw(), count, "submission started");

        let result = self.form.validate().await;
        let values = self.form.values();
        if !result.valid {
            debug!(
                form_id = self.form.id().raw(),
                errors = result.errors.len(),
                "submission blocked by validation"
            );
            if let Some(on_invalid) = &self.on_invalid {
                on_invalid(InvalidSubmission {
                    values,
                    trigger,
                    errors: result.errors.clone(),
                    results: result.results.clone(),
                });
            }
            return Ok(SubmitOutcome::Invalid);
        }

        let source = result.values.clone().unwrap_or(values);
        let controlled_values = self.form.controlled_from(&source);
        let submitted = if self.controlled_only {
            controlled_values.clone()
        } else {
            source
        };
        let actions = SubmissionActions {
            form: self.form.clone(),
            trigger,
            controlled_values,
        };
        (self.on_success)(submitted, actions).await?;
        info!(form_id = self.form.id().raw(), count, "form submitted");
        Ok(SubmitOutcome::Submitted)
    }
}

impl FormContext {
    /// Build a submission handler that passes the whole value tree (or the
    /// schema's coerced values) to `on_success`.
    pub fn handle_submit<F, Fut, E>(&self, on_success: F) -> SubmitHandler<F>
    where
        F: Fn(Value, SubmissionActions) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        SubmitHandler {
            form: self.clone(),
            on_success,
            on_invalid: None,
            controlled_only: false,
        }
    }

    /// Like [`handle_submit`](Self::handle_submit), but only registered and
    /// bound paths are submitted.
    pub fn handle_submit_controlled<F, Fut, E>(&self, on_success: F) -> SubmitHandler<F>
    where
        F: Fn(Value, SubmissionActions) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        SubmitHandler {
            form: self.clone(),
            on_success,
            on_invalid: None,
            controlled_only: true,
        }
    }
}
