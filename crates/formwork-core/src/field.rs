#![forbid(unsafe_code)]

//! Field handles.
//!
//! A [`Field`] is a cheap, cloneable handle to one mounted input. The value
//! it shows lives in the form's value tree at the field's path and its
//! messages live in the form's error bag, so every field sharing a path sees
//! the same value and the same errors. Per-field state is limited to the
//! meta flags.
//!
//! Fields hold their form weakly. Dropping the form turns every operation on
//! an orphaned field into a no-op (or a trivially valid result).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use formwork_reactive::{Observable, Subscription};
use serde_json::Value;

use crate::config::FieldKind;
use crate::form::{FormContext, FormInner};
use crate::id::FieldId;
use crate::meta::{FieldFlags, FieldMeta};
use crate::registry::Registrant;
use crate::scheduler::{FieldValidation, ValidationMode};
use crate::schema::{FieldRules, RuleContext};
use crate::token::TokenGate;

/// Partial state update for [`Field::set_state`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldStatePatch {
    pub value: Option<Value>,
    pub initial_value: Option<Value>,
    pub touched: Option<bool>,
    pub errors: Option<Vec<String>>,
}

/// Overrides for [`Field::reset`]. Unset members fall back to the field's
/// initial value, untouched, and no errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldResetState {
    pub value: Option<Value>,
    pub touched: Option<bool>,
    pub errors: Option<Vec<String>>,
}

pub(crate) struct FieldInner {
    pub(crate) id: FieldId,
    pub(crate) path: Observable<String>,
    /// Path the registry currently files this field under. Trails `path`
    /// by one scheduling round after a rename.
    pub(crate) registered_path: RefCell<String>,
    pub(crate) kind: FieldKind,
    pub(crate) rules: Option<Rc<dyn FieldRules>>,
    pub(crate) label: Option<String>,
    pub(crate) keep_value_on_unmount: Option<bool>,
    pub(crate) validate_on_value_update: bool,
    pub(crate) flags: RefCell<FieldFlags>,
    /// Value seen at the last change check.
    pub(crate) observed: RefCell<Option<Value>>,
    pub(crate) live: TokenGate,
    pub(crate) silent: TokenGate,
    pub(crate) mounted: Cell<bool>,
    pub(crate) form: Weak<FormInner>,
    pub(crate) path_sub: RefCell<Option<Subscription>>,
}

/// Handle to a registered field.
#[derive(Clone)]
pub struct Field {
    pub(crate) inner: Rc<FieldInner>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path.get())
            .field("kind", &self.inner.kind)
            .field("flags", &*self.inner.flags.borrow())
            .field("mounted", &self.inner.mounted.get())
            .finish()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Field {}

impl Registrant for Field {
    fn registrant_id(&self) -> FieldId {
        self.inner.id
    }
}

impl Field {
    pub(crate) fn from_inner(inner: Rc<FieldInner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn id(&self) -> FieldId {
        self.inner.id
    }

    /// Current path. After [`set_path`](Self::set_path) this is the new path
    /// immediately; the registry follows on the next scheduling round.
    #[must_use]
    pub fn path(&self) -> String {
        self.inner.path.get()
    }

    /// Change the path at runtime (for example when a list index shifts).
    pub fn set_path(&self, path: impl Into<String>) {
        self.inner.path.set(path.into());
    }

    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.inner.kind
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub(crate) fn form(&self) -> Option<FormContext> {
        self.inner.form.upgrade().map(FormContext::from_inner)
    }

    // -----------------------------------------------------------------------
    // Value
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.form()?.value_at(&self.path())
    }

    /// Write `value` verbatim to the field's path.
    pub fn set_value(&self, value: Value) {
        if let Some(form) = self.form() {
            form.inner.write_value(&self.path(), value);
        }
    }

    /// Input change. Checkboxes toggle `value` in or out of the path value,
    /// everything else writes it. Validation follows on the next
    /// [`settle`](FormContext::settle).
    pub fn handle_change(&self, value: Value) {
        let Some(form) = self.form() else {
            return;
        };
        let path = self.path();
        let FieldKind::Checkbox {
            unchecked_value, ..
        } = &self.inner.kind
        else {
            form.inner.write_value(&path, value);
            return;
        };
        if form.inner.is_checkbox_group(&path) {
            form.set_field_value(&path, value);
            return;
        }
        let current = form.value_at(&path);
        match resolve_next_checkbox_value(current.as_ref(), &value, unchecked_value.as_ref()) {
            Some(next) => form.inner.write_value(&path, next),
            None => form.inner.unset_value(&path),
        };
        tracing::trace!(field_id = self.id().raw(), path = %path, "checkbox toggled");
    }

    /// Toggle a checkbox by its own checked value. No-op for other kinds.
    pub fn toggle(&self) {
        if let FieldKind::Checkbox { checked_value, .. } = &self.inner.kind {
            self.handle_change(checked_value.clone());
        }
    }

    /// Bring a checkbox or radio into the requested state.
    pub fn set_checked(&self, checked: bool) {
        if self.checked() == checked {
            return;
        }
        match &self.inner.kind {
            FieldKind::Checkbox { .. } => self.toggle(),
            FieldKind::Radio { checked_value } if checked => {
                self.handle_change(checked_value.clone());
            }
            FieldKind::Radio { .. } => {
                if let Some(form) = self.form() {
                    form.inner.unset_value(&self.path());
                }
            }
            FieldKind::Default => {}
        }
    }

    /// Whether a checkbox or radio is on. Always false for plain fields.
    #[must_use]
    pub fn checked(&self) -> bool {
        let Some(checked_value) = self.inner.kind.checked_value() else {
            return false;
        };
        match self.value() {
            Some(Value::Array(items)) if self.inner.kind.is_checkbox() => {
                items.contains(checked_value)
            }
            Some(value) => value == *checked_value,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Meta
    // -----------------------------------------------------------------------

    pub fn handle_blur(&self, validate: bool) {
        self.set_touched(true);
        if validate && let Some(form) = self.form() {
            form.inner.request_field(self, ValidationMode::ValidatedOnly);
        }
    }

    pub fn set_touched(&self, touched: bool) {
        self.update_flags(|f| f.touched = touched);
    }

    #[must_use]
    pub fn meta(&self) -> FieldMeta {
        let flags = *self.inner.flags.borrow();
        let (value, initial_value) = match self.form() {
            Some(form) => {
                let path = self.path();
                (form.value_at(&path), form.inner.initial_value_at(&path))
            }
            None => (None, None),
        };
        FieldMeta {
            touched: flags.touched,
            pending: flags.pending,
            valid: flags.valid,
            validated: flags.validated,
            dirty: value != initial_value,
            initial_value,
        }
    }

    pub(crate) fn flags(&self) -> FieldFlags {
        *self.inner.flags.borrow()
    }

    pub(crate) fn update_flags(&self, f: impl FnOnce(&mut FieldFlags)) {
        let changed = {
            let mut flags = self.inner.flags.borrow_mut();
            let before = *flags;
            f(&mut flags);
            *flags != before
        };
        if changed && let Some(form) = self.inner.form.upgrade() {
            form.bump_epoch();
        }
    }

    /// Record `value` as seen; returns whether it differs from the last one.
    pub(crate) fn observe(&self, value: Option<Value>) -> bool {
        let mut observed = self.inner.observed.borrow_mut();
        if *observed == value {
            return false;
        }
        *observed = value;
        true
    }

    /// Mode used when the value changes under this field.
    pub(crate) fn change_mode(&self) -> ValidationMode {
        if self.inner.validate_on_value_update {
            ValidationMode::ValidatedOnly
        } else {
            ValidationMode::Silent
        }
    }

    // -----------------------------------------------------------------------
    // Errors and state
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.form()
            .map(|form| form.error_bag().get(&self.path()).to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.errors().into_iter().next()
    }

    pub fn set_errors(&self, errors: Vec<String>) {
        if let Some(form) = self.form() {
            form.inner.set_errors_at(&self.path(), errors);
        }
    }

    /// Apply every member of `patch` that is set. A value written this way
    /// does not trigger change validation.
    pub fn set_state(&self, patch: FieldStatePatch) {
        let Some(form) = self.form() else {
            return;
        };
        let path = self.path();
        if let Some(initial) = patch.initial_value {
            form.inner.stage_initial(&path, initial, false);
        }
        if let Some(value) = patch.value {
            form.inner.write_value(&path, value);
            self.observe(form.value_at(&path));
        }
        if let Some(errors) = patch.errors {
            form.inner.set_errors_at(&path, errors);
        }
        if let Some(touched) = patch.touched {
            self.set_touched(touched);
        }
    }

    /// Restore the initial value (or `state.value`, which also becomes the
    /// new initial value), clear touched/validated/pending and errors, then
    /// refresh `valid` silently on the next settle.
    pub fn reset(&self, state: FieldResetState) {
        self.reset_state(state);
        if let Some(form) = self.form() {
            form.inner.request_field(self, ValidationMode::Silent);
        }
    }

    pub(crate) fn reset_state(&self, state: FieldResetState) {
        let Some(form) = self.form() else {
            return;
        };
        let path = self.path();
        let value = state
            .value
            .or_else(|| form.inner.initial_value_at(&path));
        match value {
            Some(value) => self.set_state(FieldStatePatch {
                value: Some(value.clone()),
                initial_value: Some(value),
                touched: None,
                errors: None,
            }),
            None => {
                form.inner.unset_value(&path);
                self.observe(None);
            }
        }
        form.inner
            .set_errors_at(&path, state.errors.unwrap_or_default());
        self.update_flags(|f| {
            f.touched = state.touched.unwrap_or(false);
            f.pending = false;
            f.validated = false;
        });
        tracing::debug!(field_id = self.id().raw(), path = %path, "field reset");
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Validate this field.
    ///
    /// - [`ValidationMode::Silent`] refreshes only the `valid` flag.
    /// - Any other mode marks the field validated, sets `pending` while the
    ///   run is in flight and writes the messages to the error bag.
    ///
    /// A result is applied only if no newer run of the same kind started
    /// meanwhile and the field is still mounted.
    pub async fn validate(&self, mode: ValidationMode) -> FieldValidation {
        let Some(form) = self.form() else {
            return FieldValidation::valid();
        };

        if mode == ValidationMode::Silent {
            let token = self.inner.silent.start();
            let result = self.run_validation(&form, ValidationMode::Silent).await;
            if self.inner.silent.is_current(token) && self.is_mounted() {
                self.update_flags(|f| f.valid = result.valid);
            } else {
                tracing::trace!(field_id = self.id().raw(), %token, "silent result discarded");
            }
            return result;
        }

        let token = self.inner.live.start();
        self.update_flags(|f| {
            f.pending = true;
            f.validated = true;
        });
        let result = self
            .run_validation(&form, ValidationMode::ValidatedOnly)
            .await;
        if !self.inner.live.is_current(token) {
            tracing::trace!(field_id = self.id().raw(), %token, "stale result discarded");
            return result;
        }
        if !self.is_mounted() {
            tracing::trace!(field_id = self.id().raw(), "result for unmounted field discarded");
            return result;
        }
        form.inner.set_errors_at(&self.path(), result.errors.clone());
        self.update_flags(|f| {
            f.pending = false;
            f.valid = result.valid;
        });
        result
    }

    async fn run_validation(&self, form: &FormContext, mode: ValidationMode) -> FieldValidation {
        let path = self.path();
        if form.inner.schema().is_some() {
            let outcome = form.validate_schema(mode).await;
            return outcome
                .results
                .get(&path)
                .cloned()
                .unwrap_or_else(FieldValidation::valid);
        }
        let Some(rules) = self.inner.rules.clone() else {
            return FieldValidation::valid();
        };
        let value = self.value().unwrap_or(Value::Null);
        let ctx = RuleContext {
            path,
            label: self.inner.label.clone(),
            form_values: form.values(),
        };
        FieldValidation::from_errors(rules.validate(&value, &ctx).await)
    }

    /// Unregister from the form. Value cleanup happens on the next
    /// scheduling round, governed by the keep-value setting.
    pub fn unmount(&self) {
        match self.form() {
            Some(form) => form.unregister_field(self),
            None => self.inner.mounted.set(false),
        }
    }
}

/// Next value after toggling a checkbox with `checked`.
///
/// Arrays gain or lose `checked` (deep equality); scalars flip between
/// `checked` and `unchecked`. `None` means "remove the value".
#[must_use]
pub fn resolve_next_checkbox_value(
    current: Option<&Value>,
    checked: &Value,
    unchecked: Option<&Value>,
) -> Option<Value> {
    match current {
        Some(Value::Array(items)) => {
            let mut items = items.clone();
            match items.iter().position(|v| v == checked) {
                Some(idx) => {
                    items.remove(idx);
                }
                None => items.push(checked.clone()),
            }
            Some(Value::Array(items))
        }
        Some(value) if value == checked => unchecked.cloned(),
        _ => Some(checked.clone()),
    }
}

/// Toggle `checked` inside a checkbox group's array. A missing or null value
/// starts as `[]`, a scalar is wrapped.
#[must_use]
pub fn toggle_group_value(current: Option<Value>, checked: &Value) -> Value {
    let items = match current {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(scalar) => vec![scalar],
    };
    resolve_next_checkbox_value(Some(&Value::Array(items)), checked, None)
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_toggle_uses_deep_equality() {
        let current = json!([{"id": 1}, {"id": 2}]);
        let next = resolve_next_checkbox_value(Some(&current), &json!({"id": 1}), None);
        assert_eq!(next, Some(json!([{"id": 2}])));
        let next = resolve_next_checkbox_value(next.as_ref(), &json!({"id": 3}), None);
        assert_eq!(next, Some(json!([{"id": 2}, {"id": 3}])));
    }

    #[test]
    fn scalar_toggle_flips() {
        assert_eq!(
            resolve_next_checkbox_value(Some(&json!(true)), &json!(true), Some(&json!(false))),
            Some(json!(false))
        );
        assert_eq!(
            resolve_next_checkbox_value(Some(&json!(false)), &json!(true), Some(&json!(false))),
            Some(json!(true))
        );
        assert_eq!(
            resolve_next_checkbox_value(Some(&json!("yes")), &json!("yes"), None),
            None
        );
        assert_eq!(
            resolve_next_checkbox_value(None, &json!("yes"), None),
            Some(json!("yes"))
        );
    }

    #[test]
    fn group_toggle_normalizes_current() {
        assert_eq!(toggle_group_value(None, &json!("red")), json!(["red"]));
        assert_eq!(toggle_group_value(Some(Value::Null), &json!("red")), json!(["red"]));
        assert_eq!(
            toggle_group_value(Some(json!("blue")), &json!("red")),
            json!(["blue", "red"])
        );
        assert_eq!(toggle_group_value(Some(json!(["red"])), &json!("red")), json!([]));
    }
}
