#![forbid(unsafe_code)]

//! The form context.
//!
//! [`FormContext`] owns the value tree, the error bag, the initial-values
//! store and the path registry. Everything a field shows is read back from
//! here, keyed by path.
//!
//! # Invariants
//!
//! 1. The error bag never stores an empty message list.
//! 2. Every registered field has a mounted handle; unmounting removes it
//!    from the registry synchronously, value cleanup follows one round later.
//! 3. `meta().dirty` is `values() != initial current`, structurally.
//! 4. `meta().valid` is false whenever the error bag is non-empty.
//!
//! Writes are synchronous. Validation triggered by them is queued and runs
//! on [`settle`](FormContext::settle).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use formwork_reactive::{Computed, DeferredQueue, Observable};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::FormConfig;
use crate::error::{FormError, FormResult};
use crate::error_bag::ErrorBag;
use crate::field::{Field, FieldResetState, toggle_group_value};
use crate::field_array::FieldArrayInner;
use crate::id::FormId;
use crate::initial::InitialValues;
use crate::meta::{FieldFlags, FormMeta, aggregate};
use crate::path;
use crate::registry::{PathEntry, PathRegistry};
use crate::scheduler::{BatchKind, DebouncedBatch, Requests, ValidationMode};
use crate::schema::Schema;

/// Overrides for [`FormContext::reset_form`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormResetState {
    /// New baseline. Replaces both initial snapshots when set.
    pub values: Option<Value>,
    pub touched: IndexMap<String, bool>,
    /// Replaces the whole error bag.
    pub errors: IndexMap<String, Vec<String>>,
    pub submit_count: u32,
}

pub(crate) struct FormInner {
    pub(crate) id: FormId,
    pub(crate) debounce: Duration,
    pub(crate) keep_values_on_unmount: bool,
    pub(crate) schema: RefCell<Option<Rc<dyn Schema>>>,
    pub(crate) values: Observable<Value>,
    pub(crate) errors: Observable<ErrorBag>,
    pub(crate) initial: Observable<InitialValues>,
    pub(crate) registry: RefCell<PathRegistry<Field>>,
    /// Bumped on field flag and registry changes so `meta` recomputes.
    pub(crate) epoch: Observable<u64>,
    pub(crate) meta: Computed<FormMeta>,
    pub(crate) initial_errors: RefCell<IndexMap<String, String>>,
    pub(crate) initial_touched: IndexMap<String, bool>,
    pub(crate) submit_count: Cell<u32>,
    pub(crate) submitting: Cell<bool>,
    pub(crate) validating: Cell<usize>,
    pub(crate) deferred: DeferredQueue,
    pub(crate) silent_batch: DebouncedBatch,
    pub(crate) live_batch: DebouncedBatch,
    pub(crate) eval_lock: tokio::sync::Mutex<()>,
    pub(crate) requests: RefCell<Requests>,
    /// Value tree seen at the last change check.
    pub(crate) observed: RefCell<Value>,
    pub(crate) bound_paths: RefCell<IndexSet<String>>,
    pub(crate) arrays: RefCell<Vec<Weak<FieldArrayInner>>>,
}

impl FormInner {
    pub(crate) fn schema(&self) -> Option<Rc<dyn Schema>> {
        self.schema.borrow().clone()
    }

    pub(crate) fn bump_epoch(&self) {
        self.epoch.update(|e| *e += 1);
    }

    pub(crate) fn entry(&self, path: &str) -> Option<PathEntry<Field>> {
        self.registry.borrow().resolve(path).cloned()
    }

    pub(crate) fn all_fields(&self) -> Vec<Field> {
        self.registry.borrow().fields().cloned().collect()
    }

    pub(crate) fn is_checkbox_group(&self, path: &str) -> bool {
        matches!(
            self.registry.borrow().resolve(path),
            Some(PathEntry::Group { members, .. })
                if members.first().is_some_and(|f| f.kind().is_checkbox())
        )
    }

    pub(crate) fn write_value(&self, path: &str, value: Value) -> bool {
        self.values.update_if(|tree| {
            if path::get_in(tree, path) == Some(&value) {
                return false;
            }
            let written = path::set_in(tree, path, value);
            if !written {
                warn!(form_id = self.id.raw(), path, "write past the array index limit ignored");
            }
            written
        })
    }

    pub(crate) fn unset_value(&self, path: &str) -> bool {
        self.values.update_if(|tree| path::unset_in(tree, path))
    }

    pub(crate) fn initial_value_at(&self, path: &str) -> Option<Value> {
        self.initial.with(|i| i.value_at(path).cloned())
    }

    pub(crate) fn stage_initial(&self, path: &str, value: Value, update_original: bool) {
        self.initial.update_if(|initial| {
            let unchanged = initial.value_at(path) == Some(&value)
                && (!update_original || initial.original_at(path) == Some(&value));
            if unchanged {
                return false;
            }
            initial.stage(path, value, update_original);
            true
        });
    }

    /// Replace the messages at `path` and mirror the outcome onto the
    /// `valid` flag of every field registered there.
    pub(crate) fn set_errors_at(&self, path: &str, messages: Vec<String>) {
        let valid = messages.is_empty();
        self.errors.update_if(|bag| bag.set(path, messages));
        if let Some(entry) = self.entry(path) {
            for field in entry.members() {
                field.update_flags(|f| f.valid = valid);
            }
        }
    }

    pub(crate) fn request_form(&self, mode: ValidationMode) {
        self.requests.borrow_mut().form(mode);
    }

    pub(crate) fn request_field(&self, field: &Field, mode: ValidationMode) {
        self.requests.borrow_mut().field(field, mode);
    }

    fn compute_meta(&self) -> FormMeta {
        let flags: Vec<FieldFlags> = self.registry.borrow().fields().map(Field::flags).collect();
        let errors_empty = self.errors.with(ErrorBag::is_empty);
        self.values.with(|values| {
            self.initial
                .with(|initial| aggregate(&flags, errors_empty, values, initial.current()))
        })
    }

    fn sync_observed(&self) {
        let values = self.values.get();
        for field in self.all_fields() {
            field.observe(path::get_in(&values, &field.path()).cloned());
        }
        *self.observed.borrow_mut() = values;
    }
}

/// Shared handle to a form.
#[derive(Clone)]
pub struct FormContext {
    pub(crate) inner: Rc<FormInner>,
}

impl fmt::Debug for FormContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormContext")
            .field("id", &self.inner.id)
            .field("fields", &self.inner.registry.borrow().len())
            .field("errors", &self.inner.errors.with(ErrorBag::len))
            .field("submit_count", &self.inner.submit_count.get())
            .finish()
    }
}

impl Default for FormContext {
    fn default() -> Self {
        Self::new(FormConfig::default())
    }
}

impl FormContext {
    pub fn new(config: FormConfig) -> Self {
        let FormConfig {
            initial_values,
            initial_errors,
            initial_touched,
            validate_on_mount,
            keep_values_on_unmount,
            debounce,
            schema,
        } = config;
        let initial_values = schema
            .as_ref()
            .and_then(|s| s.cast(&initial_values))
            .unwrap_or(initial_values);
        let has_schema = schema.is_some();
        let bag: ErrorBag = initial_errors
            .iter()
            .filter(|(_, message)| !message.is_empty())
            .map(|(path, message)| (path.clone(), vec![message.clone()]))
            .collect();

        let inner = Rc::new_cyclic(|weak: &Weak<FormInner>| {
            let values = Observable::new(initial_values.clone());
            let errors = Observable::new(bag);
            let initial = Observable::new(InitialValues::new(initial_values.clone()));
            let epoch = Observable::new(0u64);
            let meta = {
                let weak = weak.clone();
                Computed::new(move || {
                    weak.upgrade()
                        .map(|form| form.compute_meta())
                        .unwrap_or_default()
                })
            };
            meta.track(&values)
                .track(&errors)
                .track(&initial)
                .track(&epoch);
            FormInner {
                id: FormId::next(),
                debounce,
                keep_values_on_unmount,
                schema: RefCell::new(schema),
                values,
                errors,
                initial,
                registry: RefCell::new(PathRegistry::new()),
                epoch,
                meta,
                initial_errors: RefCell::new(initial_errors),
                initial_touched,
                submit_count: Cell::new(0),
                submitting: Cell::new(false),
                validating: Cell::new(0),
                deferred: DeferredQueue::new(),
                silent_batch: DebouncedBatch::new(BatchKind::Silent),
                live_batch: DebouncedBatch::new(BatchKind::Live),
                eval_lock: tokio::sync::Mutex::new(()),
                requests: RefCell::new(Requests::default()),
                observed: RefCell::new(initial_values),
                bound_paths: RefCell::new(IndexSet::new()),
                arrays: RefCell::new(Vec::new()),
            }
        });

        let form = Self { inner };
        if validate_on_mount {
            form.inner.request_form(ValidationMode::Force);
        } else if has_schema {
            form.inner.request_form(ValidationMode::Silent);
        }
        debug!(form_id = form.inner.id.raw(), has_schema, "form created");
        form
    }

    pub(crate) fn from_inner(inner: Rc<FormInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<FormInner> {
        Rc::downgrade(&self.inner)
    }

    #[must_use]
    pub fn id(&self) -> FormId {
        self.inner.id
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Deep clone of the value tree.
    #[must_use]
    pub fn values(&self) -> Value {
        self.inner.values.get()
    }

    #[must_use]
    pub fn value_at(&self, path: &str) -> Option<Value> {
        self.inner.values.with(|v| path::get_in(v, path).cloned())
    }

    /// First message per path.
    #[must_use]
    pub fn errors(&self) -> IndexMap<String, String> {
        self.inner.errors.with(ErrorBag::first_errors)
    }

    #[must_use]
    pub fn error_bag(&self) -> ErrorBag {
        self.inner.errors.get()
    }

    #[must_use]
    pub fn initial_values(&self) -> InitialValues {
        self.inner.initial.get()
    }

    #[must_use]
    pub fn meta(&self) -> FormMeta {
        self.inner.meta.get()
    }

    #[must_use]
    pub fn submit_count(&self) -> u32 {
        self.inner.submit_count.get()
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.get()
    }

    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.inner.validating.get() > 0
    }

    /// First field registered at `path`.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<Field> {
        self.inner.registry.borrow().first(path).cloned()
    }

    /// Every field registered at `path` (more than one for groups).
    #[must_use]
    pub fn fields_at(&self, path: &str) -> Vec<Field> {
        self.inner
            .entry(path)
            .map(|entry| entry.members().to_vec())
            .unwrap_or_default()
    }

    pub fn try_field(&self, path: &str) -> FormResult<Field> {
        self.field(path).ok_or_else(|| FormError::FieldNotFound {
            path: path.to_string(),
        })
    }

    #[must_use]
    pub fn registered_paths(&self) -> Vec<String> {
        self.inner
            .registry
            .borrow()
            .paths()
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn is_field_dirty(&self, path: &str) -> bool {
        self.value_at(path) != self.inner.initial_value_at(path)
    }

    #[must_use]
    pub fn is_field_touched(&self, path: &str) -> bool {
        self.fields_at(path).iter().any(|f| f.flags().touched)
    }

    #[must_use]
    pub fn is_field_valid(&self, path: &str) -> bool {
        let fields = self.fields_at(path);
        if fields.is_empty() {
            return self.inner.errors.with(|bag| !bag.contains(path));
        }
        fields.iter().all(|f| f.flags().valid)
    }

    /// Values limited to registered and bound paths.
    #[must_use]
    pub fn controlled_values(&self) -> Value {
        self.inner.values.with(|values| self.controlled_from(values))
    }

    /// Project `values` onto the registered and bound paths.
    pub(crate) fn controlled_from(&self, values: &Value) -> Value {
        let mut paths = self.registered_paths();
        paths.extend(self.inner.bound_paths.borrow().iter().cloned());
        path::pick(values, paths.iter().map(String::as_str))
    }

    // -----------------------------------------------------------------------
    // Value writes
    // -----------------------------------------------------------------------

    /// Write `value` at `path`. A non-array value written to a checkbox
    /// group toggles membership instead of replacing the array.
    pub fn set_field_value(&self, path: &str, value: Value) {
        if self.inner.is_checkbox_group(path) && !value.is_array() {
            let next = toggle_group_value(self.value_at(path), &value);
            self.inner.write_value(path, next);
            trace!(form_id = self.inner.id.raw(), path, "checkbox group toggled");
            return;
        }
        self.inner.write_value(path, value);
    }

    /// Replace the whole value tree.
    pub fn set_values(&self, values: Value) {
        self.inner.values.set(values);
        self.regenerate_arrays();
    }

    // -----------------------------------------------------------------------
    // Errors and touched
    // -----------------------------------------------------------------------

    pub fn set_field_error(&self, path: &str, message: Option<String>) {
        self.inner
            .set_errors_at(path, message.into_iter().collect());
    }

    pub fn set_field_errors(&self, path: &str, messages: Vec<String>) {
        self.inner.set_errors_at(path, messages);
    }

    /// Merge per-path messages into the bag. Paths not mentioned keep theirs.
    pub fn set_errors(&self, errors: IndexMap<String, Vec<String>>) {
        for (path, messages) in errors {
            self.inner.set_errors_at(&path, messages);
        }
    }

    pub fn set_field_touched(&self, path: &str, touched: bool) {
        for field in self.fields_at(path) {
            field.set_touched(touched);
        }
    }

    pub fn set_touched(&self, touched: IndexMap<String, bool>) {
        for (path, flag) in touched {
            self.set_field_touched(&path, flag);
        }
    }

    pub fn set_all_touched(&self, touched: bool) {
        for field in self.inner.all_fields() {
            field.set_touched(touched);
        }
    }

    // -----------------------------------------------------------------------
    // Resets and initial values
    // -----------------------------------------------------------------------

    /// Reset the first field at `path`.
    pub fn reset_field(&self, path: &str, state: FieldResetState) {
        match self.field(path) {
            Some(field) => field.reset(state),
            None => warn!(form_id = self.inner.id.raw(), path, "reset of unknown field ignored"),
        }
    }

    /// Restore the form to its initial state, or to `state` when given.
    ///
    /// Values come from `state.values` (which also becomes the new baseline)
    /// or from the original snapshot. Every field is reset, the error bag is
    /// replaced wholesale and the submit count is overwritten. A silent
    /// validation follows on the next settle.
    pub fn reset_form(&self, state: Option<FormResetState>) {
        let state = state.unwrap_or_default();
        let values = match state.values {
            Some(values) => {
                let values = self.cast(values);
                self.inner.initial.update(|i| i.set(values.clone()));
                values
            }
            None => {
                self.inner.initial.update(InitialValues::restore_current);
                self.inner.initial.with(|i| i.original().clone())
            }
        };

        for field in self.inner.all_fields() {
            let path = field.path();
            field.reset_state(FieldResetState {
                value: path::get_in(&values, &path).cloned(),
                touched: Some(state.touched.get(&path).copied().unwrap_or(false)),
                errors: None,
            });
        }

        self.inner.values.set(values);
        self.inner
            .errors
            .set(state.errors.into_iter().collect::<ErrorBag>());
        self.inner.submit_count.set(state.submit_count);
        self.regenerate_arrays();
        self.inner.sync_observed();
        self.inner.request_form(ValidationMode::Silent);
        debug!(form_id = self.inner.id.raw(), "form reset");
    }

    /// Replace both initial snapshots. With `update_fields`, untouched
    /// fields also take the new value.
    pub fn set_initial_values(&self, values: Value, update_fields: bool) {
        let values = self.cast(values);
        self.inner.initial.update(|i| i.set(values.clone()));
        if !update_fields {
            return;
        }
        for field in self.inner.all_fields() {
            if field.flags().touched {
                continue;
            }
            let path = field.path();
            match path::get_in(&values, &path) {
                Some(value) => {
                    self.inner.write_value(&path, value.clone());
                }
                None => {
                    self.inner.unset_value(&path);
                }
            }
        }
    }

    /// Stage one initial value. Only the `current` snapshot changes unless
    /// `update_original` is set.
    pub fn stage_initial_value(&self, path: &str, value: Value, update_original: bool) {
        self.inner.stage_initial(path, value, update_original);
    }

    /// Swap the schema and revalidate fields that already surfaced errors.
    pub fn set_schema(&self, schema: Option<Rc<dyn Schema>>) {
        *self.inner.schema.borrow_mut() = schema;
        self.inner.request_form(ValidationMode::ValidatedOnly);
    }

    fn cast(&self, values: Value) -> Value {
        match self.inner.schema() {
            Some(schema) => schema.cast(&values).unwrap_or(values),
            None => values,
        }
    }

    pub(crate) fn regenerate_arrays(&self) {
        let arrays: Vec<Rc<FieldArrayInner>> = {
            let mut arrays = self.inner.arrays.borrow_mut();
            arrays.retain(|w| w.strong_count() > 0);
            arrays.iter().filter_map(Weak::upgrade).collect()
        };
        for array in arrays {
            array.regenerate(self);
        }
    }
}
