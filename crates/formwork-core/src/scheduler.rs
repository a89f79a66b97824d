#![forbid(unsafe_code)]

//! Validation scheduling.
//!
//! Schema validation is batched: every request that arrives while a batch
//! window is open extends the window (trailing debounce) and receives the
//! same shared result. Silent and live requests use separate windows so a
//! silent refresh can never surface errors meant to stay hidden, and the
//! other way round.
//!
//! At most one schema evaluation runs at a time per form; a window that
//! closes while another evaluation is in flight waits for it.
//!
//! Forms without a schema validate field by field, concurrently, and every
//! field discards results that a newer run has superseded.
//!
//! Debounce timers use `tokio::time`, so validation must be driven from
//! inside a Tokio runtime (a current-thread runtime or `LocalSet` is
//! enough; nothing here is `Send`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared, join, join_all};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::field::Field;
use crate::form::{FormContext, FormInner};
use crate::id::FieldId;
use crate::path;
use crate::schema::SchemaResult;

/// Passes [`FormContext::settle`] makes before giving up on a form that
/// keeps scheduling new work.
const MAX_SETTLE_PASSES: usize = 64;

/// What a validation run may change.
///
/// Ordered by strength: a batch asked for in several modes runs in the
/// strongest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationMode {
    /// Refresh `valid` flags only; never touch messages.
    Silent,
    /// Surface messages for fields that were already validated.
    ValidatedOnly,
    /// Mark every field validated and surface all messages.
    Force,
}

/// Result for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Default for FieldValidation {
    fn default() -> Self {
        Self::valid()
    }
}

impl FieldValidation {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Result of a whole-form validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FormValidation {
    pub valid: bool,
    pub results: IndexMap<String, FieldValidation>,
    /// First message per failing path.
    pub errors: IndexMap<String, String>,
    /// Coerced values from the schema, if it produced any.
    pub values: Option<Value>,
}

impl Default for FormValidation {
    fn default() -> Self {
        Self {
            valid: true,
            results: IndexMap::new(),
            errors: IndexMap::new(),
            values: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pending requests
// ---------------------------------------------------------------------------

/// Validation requested by synchronous writes, run on the next settle.
#[derive(Default)]
pub(crate) struct Requests {
    form: Option<ValidationMode>,
    fields: IndexMap<FieldId, (Field, ValidationMode)>,
}

impl Requests {
    pub(crate) fn form(&mut self, mode: ValidationMode) {
        self.form = Some(self.form.map_or(mode, |current| current.max(mode)));
    }

    pub(crate) fn field(&mut self, field: &Field, mode: ValidationMode) {
        self.fields
            .entry(field.id())
            .and_modify(|(_, current)| *current = (*current).max(mode))
            .or_insert_with(|| (field.clone(), mode));
    }

    fn is_empty(&self) -> bool {
        self.form.is_none() && self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Debounced batches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchKind {
    Silent,
    Live,
}

type SharedValidation = Shared<LocalBoxFuture<'static, Rc<FormValidation>>>;

struct Window {
    id: u64,
    deadline: Rc<Cell<Instant>>,
    mode: Rc<Cell<ValidationMode>>,
    result: SharedValidation,
}

/// One trailing-debounce window for schema validation.
pub(crate) struct DebouncedBatch {
    kind: BatchKind,
    window: RefCell<Option<Window>>,
    opened: Cell<u64>,
}

impl DebouncedBatch {
    pub(crate) fn new(kind: BatchKind) -> Self {
        Self {
            kind,
            window: RefCell::new(None),
            opened: Cell::new(0),
        }
    }

    /// Join the open window (pushing its deadline out) or open a new one.
    fn request(&self, form: &FormContext, mode: ValidationMode) -> SharedValidation {
        let deadline = Instant::now() + form.inner.debounce;
        let mut window = self.window.borrow_mut();
        if let Some(open) = window.as_ref() {
            open.deadline.set(deadline);
            open.mode.set(open.mode.get().max(mode));
            trace!(form_id = form.id().raw(), kind = ?self.kind, window = open.id, "joined batch");
            return open.result.clone();
        }

        let id = self.opened.get() + 1;
        self.opened.set(id);
        let deadline = Rc::new(Cell::new(deadline));
        let mode = Rc::new(Cell::new(mode));
        let weak = form.downgrade();
        let kind = self.kind;
        let result = {
            let deadline = Rc::clone(&deadline);
            let mode = Rc::clone(&mode);
            async move {
                loop {
                    let target = deadline.get();
                    tokio::time::sleep_until(target).await;
                    if deadline.get() <= target {
                        break;
                    }
                }
                let Some(inner) = weak.upgrade() else {
                    return Rc::new(FormValidation::default());
                };
                let form = FormContext::from_inner(inner);
                form.inner.batch(kind).close(id);
                form.evaluate(mode.get()).await
            }
        }
        .boxed_local()
        .shared();
        trace!(form_id = form.id().raw(), kind = ?self.kind, window = id, "opened batch");
        *window = Some(Window {
            id,
            deadline,
            mode,
            result: result.clone(),
        });
        result
    }

    fn close(&self, id: u64) {
        let mut window = self.window.borrow_mut();
        if window.as_ref().is_some_and(|w| w.id == id) {
            *window = None;
        }
    }
}

impl FormInner {
    fn batch(&self, kind: BatchKind) -> &DebouncedBatch {
        match kind {
            BatchKind::Silent => &self.silent_batch,
            BatchKind::Live => &self.live_batch,
        }
    }
}

/// Keeps `is_validating` raised for its lifetime.
struct ValidatingGuard<'a>(&'a Cell<usize>);

impl<'a> ValidatingGuard<'a> {
    fn enter(counter: &'a Cell<usize>) -> Self {
        counter.set(counter.get() + 1);
        Self(counter)
    }
}

impl Drop for ValidatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// Form-level validation
// ---------------------------------------------------------------------------

impl FormContext {
    /// Validate everything, surfacing all messages.
    pub async fn validate(&self) -> Rc<FormValidation> {
        self.validate_with(ValidationMode::Force).await
    }

    /// Validate the whole form in `mode`.
    pub async fn validate_with(&self, mode: ValidationMode) -> Rc<FormValidation> {
        let _busy = ValidatingGuard::enter(&self.inner.validating);
        if mode == ValidationMode::Force {
            for field in self.inner.all_fields() {
                field.update_flags(|f| f.validated = true);
            }
        }
        if self.inner.schema().is_some() {
            return self.validate_schema(mode).await;
        }

        let targets: Vec<(String, Field)> = self
            .inner
            .registry
            .borrow()
            .entries()
            .filter_map(|(path, entry)| Some((path.to_string(), entry.first()?.clone())))
            .collect();
        let runs = targets.into_iter().map(|(path, field)| async move {
            // Fields that never surfaced errors only refresh `valid`.
            let mode = if mode == ValidationMode::ValidatedOnly && !field.flags().validated {
                ValidationMode::Silent
            } else {
                mode
            };
            let result = field.validate(mode).await;
            (path, result)
        });
        let mut outcome = FormValidation::default();
        for (path, result) in join_all(runs).await {
            outcome.valid &= result.valid;
            if let Some(first) = result.errors.first() {
                outcome.errors.insert(path.clone(), first.clone());
            }
            outcome.results.insert(path, result);
        }
        debug!(
            form_id = self.id().raw(),
            mode = ?mode,
            valid = outcome.valid,
            fields = outcome.results.len(),
            "field validation finished"
        );
        Rc::new(outcome)
    }

    /// Validate the first field at `path` and surface its messages. An
    /// unknown path is reported as valid.
    pub async fn validate_field(&self, path: &str) -> FieldValidation {
        let Some(field) = self.field(path) else {
            warn!(form_id = self.id().raw(), path, "validation of unknown field skipped");
            return FieldValidation::valid();
        };
        field.validate(ValidationMode::ValidatedOnly).await
    }

    /// Schedule a batched schema run. Requests inside the debounce window
    /// share one evaluation and receive the same `Rc`.
    pub(crate) async fn validate_schema(&self, mode: ValidationMode) -> Rc<FormValidation> {
        let batch = match mode {
            ValidationMode::Silent => &self.inner.silent_batch,
            ValidationMode::ValidatedOnly | ValidationMode::Force => &self.inner.live_batch,
        };
        batch.request(self, mode).await
    }

    async fn evaluate(&self, mode: ValidationMode) -> Rc<FormValidation> {
        let _serial = self.inner.eval_lock.lock().await;
        let Some(schema) = self.inner.schema() else {
            return Rc::new(FormValidation::default());
        };
        let values = self.values();
        trace!(form_id = self.id().raw(), mode = ?mode, "schema evaluation started");
        let result = schema.validate(&values).await;
        let outcome = self.reconcile(result, mode);
        debug!(
            form_id = self.id().raw(),
            mode = ?mode,
            valid = outcome.valid,
            errors = outcome.errors.len(),
            "schema validation finished"
        );
        Rc::new(outcome)
    }

    /// Apply a schema result.
    ///
    /// Covers every path the schema reported, every registered path and
    /// every path already holding messages. Unregistered paths always get
    /// their messages written; registered ones follow `mode`.
    fn reconcile(&self, result: SchemaResult, mode: ValidationMode) -> FormValidation {
        let SchemaResult {
            valid,
            mut errors,
            values,
        } = result;
        let mut paths: IndexSet<String> = errors.keys().cloned().collect();
        paths.extend(self.registered_paths());
        paths.extend(
            self.inner
                .errors
                .with(|bag| bag.paths().map(str::to_string).collect::<Vec<_>>()),
        );

        let mut outcome = FormValidation {
            valid,
            results: IndexMap::new(),
            errors: IndexMap::new(),
            values,
        };
        for path in paths {
            let result = FieldValidation::from_errors(errors.shift_remove(&path).unwrap_or_default());
            if let Some(first) = result.errors.first() {
                outcome.errors.insert(path.clone(), first.clone());
            }
            outcome.results.insert(path.clone(), result.clone());

            let Some(entry) = self.inner.entry(&path) else {
                self.inner.set_errors_at(&path, result.errors);
                continue;
            };
            for field in entry.members() {
                field.update_flags(|f| f.valid = result.valid);
            }
            match mode {
                ValidationMode::Silent => continue,
                ValidationMode::ValidatedOnly
                    if !entry.members().iter().any(|f| f.flags().validated) =>
                {
                    continue;
                }
                _ => {}
            }
            self.inner.set_errors_at(&path, result.errors);
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Draining scheduled work
    // -----------------------------------------------------------------------

    /// Run one round of deferred bookkeeping (renames, unmount cleanup).
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        self.inner.deferred.run_round()
    }

    /// Drain deferred bookkeeping, pick up value changes and run every
    /// requested validation until nothing is left to do.
    pub async fn settle(&self) {
        for _ in 0..MAX_SETTLE_PASSES {
            self.inner.deferred.drain();
            self.observe_values();
            let requests = self.inner.requests.take();
            if requests.is_empty() {
                if self.inner.deferred.is_empty() {
                    return;
                }
                continue;
            }
            self.run_requests(requests).await;
        }
        warn!(
            form_id = self.id().raw(),
            passes = MAX_SETTLE_PASSES,
            "form did not settle"
        );
    }

    fn observe_values(&self) {
        let current = self.values();
        let form_changed = {
            let mut observed = self.inner.observed.borrow_mut();
            if *observed == current {
                false
            } else {
                *observed = current.clone();
                true
            }
        };
        if form_changed && self.inner.schema().is_some() {
            self.inner.request_form(ValidationMode::ValidatedOnly);
        }
        for field in self.inner.all_fields() {
            let value = path::get_in(&current, &field.path()).cloned();
            if field.observe(value) {
                self.inner.request_field(&field, field.change_mode());
            }
        }
    }

    async fn run_requests(&self, requests: Requests) {
        let Requests { form, fields } = requests;
        trace!(
            form_id = self.id().raw(),
            form = ?form,
            fields = fields.len(),
            "running requested validation"
        );
        let form_run = async {
            if let Some(mode) = form {
                self.validate_with(mode).await;
            }
        };
        let field_runs = join_all(
            fields
                .into_values()
                .filter(|(field, _)| field.is_mounted())
                .map(|(field, mode)| async move {
                    field.validate(mode).await;
                }),
        );
        join(form_run, field_runs).await;
    }
}
