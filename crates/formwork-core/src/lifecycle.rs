#![forbid(unsafe_code)]

//! Field registration, renames and unmounting.
//!
//! Registration is synchronous. Renames and unmount cleanup are deferred to
//! the next scheduling round so that a field leaving a path and another one
//! arriving in the same round can be told apart from a plain removal.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use formwork_reactive::Observable;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{FieldKind, FieldOptions};
use crate::field::{Field, FieldInner};
use crate::form::{FormContext, FormInner};
use crate::id::FieldId;
use crate::meta::FieldFlags;
use crate::registry::EntryIdentity;
use crate::scheduler::ValidationMode;
use crate::token::TokenGate;

impl FormContext {
    /// Register a field and return its handle.
    ///
    /// The starting value is the explicit `initial_value`, else the form's
    /// value at the path, else the staged initial value. Fields that mount
    /// late stage their starting value as the baseline so they do not read
    /// as dirty.
    pub fn register_field(&self, options: FieldOptions) -> Field {
        let FieldOptions {
            path,
            kind,
            rules,
            initial_value,
            keep_value_on_unmount,
            label,
            validate_on_value_update,
            validate_on_mount,
        } = options;

        self.seed_value(&path, &kind, initial_value);

        let valid = self.inner.errors.with(|bag| !bag.contains(&path));
        let touched = self
            .inner
            .initial_touched
            .get(&path)
            .copied()
            .unwrap_or(false);
        let field = Field::from_inner(Rc::new(FieldInner {
            id: FieldId::next(),
            path: Observable::new(path.clone()),
            registered_path: RefCell::new(path.clone()),
            kind,
            rules,
            label,
            keep_value_on_unmount,
            validate_on_value_update,
            flags: RefCell::new(FieldFlags {
                touched,
                valid,
                ..FieldFlags::default()
            }),
            observed: RefCell::new(self.value_at(&path)),
            live: TokenGate::new(),
            silent: TokenGate::new(),
            mounted: Cell::new(true),
            form: self.downgrade(),
            path_sub: RefCell::new(None),
        }));

        self.inner.registry.borrow_mut().insert(field.clone(), &path);
        self.inner.bump_epoch();
        self.watch_path(&field);

        // An error that differs from the seeded one was produced while the
        // field was away; revalidate so it matches the current value.
        let message = self
            .inner
            .errors
            .with(|bag| bag.first(&path).map(str::to_string));
        let seeded = self.inner.initial_errors.borrow_mut().shift_remove(&path);
        if let Some(message) = message
            && seeded.as_deref() != Some(message.as_str())
            && let Some(first) = self.field(&path)
        {
            self.inner
                .request_field(&first, ValidationMode::ValidatedOnly);
        }

        if validate_on_mount {
            self.inner
                .request_field(&field, ValidationMode::ValidatedOnly);
        } else if self.inner.schema().is_some() {
            self.inner.request_form(ValidationMode::Silent);
        } else {
            self.inner.request_field(&field, ValidationMode::Silent);
        }

        debug!(
            form_id = self.id().raw(),
            field_id = field.id().raw(),
            path = %path,
            "field registered"
        );
        field
    }

    fn seed_value(&self, path: &str, kind: &FieldKind, explicit: Option<Value>) {
        let existing = self.value_at(path);
        let staged = self.inner.initial_value_at(path);
        match (kind, explicit) {
            (FieldKind::Default, Some(value)) => {
                self.inner.stage_initial(path, value.clone(), false);
                self.inner.write_value(path, value);
            }
            (FieldKind::Default, None) => match (existing, staged) {
                (None, Some(staged)) => {
                    self.inner.write_value(path, staged);
                }
                (Some(existing), None) => {
                    self.inner.stage_initial(path, existing, false);
                }
                _ => {}
            },
            (FieldKind::Checkbox { .. } | FieldKind::Radio { .. }, Some(value)) => {
                if existing.is_none() {
                    self.inner.write_value(path, value.clone());
                }
                if staged.is_none() {
                    self.inner.stage_initial(path, value, false);
                }
            }
            (FieldKind::Checkbox { .. } | FieldKind::Radio { .. }, None) => {}
        }
    }

    fn watch_path(&self, field: &Field) {
        let form = self.downgrade();
        let weak_field = Rc::downgrade(&field.inner);
        let sub = field.inner.path.subscribe(move |new_path: &String| {
            if let Some(inner) = form.upgrade() {
                FormContext::from_inner(inner).schedule_rename(weak_field.clone(), new_path.clone());
            }
        });
        *field.inner.path_sub.borrow_mut() = Some(sub);
    }

    fn schedule_rename(&self, field: Weak<FieldInner>, new_path: String) {
        let form = self.downgrade();
        self.inner.deferred.defer(move || {
            if let (Some(inner), Some(field)) = (form.upgrade(), field.upgrade()) {
                FormContext::from_inner(inner).apply_rename(&Field::from_inner(field), new_path);
            }
        });
    }

    fn apply_rename(&self, field: &Field, new_path: String) {
        if !field.is_mounted() {
            return;
        }
        let old_path = field.inner.registered_path.replace(new_path.clone());
        if old_path == new_path {
            return;
        }
        self.inner
            .registry
            .borrow_mut()
            .rename(field.clone(), &old_path, &new_path);
        self.inner.bump_epoch();

        let had_errors = self
            .inner
            .errors
            .with(|bag| bag.contains(&old_path) || bag.contains(&new_path));
        if had_errors {
            self.inner.set_errors_at(&old_path, Vec::new());
            if let Some(first) = self.field(&new_path) {
                self.inner
                    .request_field(&first, ValidationMode::ValidatedOnly);
            }
        }
        debug!(
            form_id = self.id().raw(),
            field_id = field.id().raw(),
            from = %old_path,
            to = %new_path,
            "field renamed"
        );

        let form = self.downgrade();
        self.inner.deferred.defer(move || {
            let Some(inner) = form.upgrade() else {
                return;
            };
            let abandoned = !inner.registry.borrow().exists(&old_path);
            if abandoned && inner.unset_value(&old_path) {
                trace!(path = %old_path, "abandoned path cleared");
            }
        });
    }

    /// Remove `field` from the registry now; clean up its value and errors
    /// on the next round.
    pub(crate) fn unregister_field(&self, field: &Field) {
        if !field.inner.mounted.replace(false) {
            return;
        }
        field.inner.path_sub.borrow_mut().take();
        let path = field.inner.registered_path.borrow().clone();
        let before = self.inner.registry.borrow().identity(&path);
        self.inner.registry.borrow_mut().remove(field.id(), &path);
        self.inner.bump_epoch();

        let cleanup = Unmount {
            was_group: matches!(before, Some(EntryIdentity::Group(_))),
            before,
            keep: field
                .inner
                .keep_value_on_unmount
                .unwrap_or(self.inner.keep_values_on_unmount),
            checked_value: field.kind().checked_value().cloned(),
            path,
        };
        debug!(
            form_id = self.id().raw(),
            field_id = field.id().raw(),
            path = %cleanup.path,
            keep = cleanup.keep,
            "field unregistered"
        );
        let form = self.downgrade();
        self.inner.deferred.defer(move || {
            if let Some(inner) = form.upgrade() {
                cleanup.finish(&inner);
            }
        });
    }
}

/// Deferred half of an unregister.
struct Unmount {
    path: String,
    before: Option<EntryIdentity>,
    was_group: bool,
    keep: bool,
    checked_value: Option<Value>,
}

impl Unmount {
    fn finish(self, form: &FormInner) {
        let path = self.path.as_str();
        let now = form.registry.borrow().identity(path);
        let same_group = self.was_group && (now.is_none() || now == self.before);

        if same_group
            && !self.keep
            && let Some(checked) = &self.checked_value
        {
            let current = form.values.with(|v| crate::path::get_in(v, path).cloned());
            match current {
                Some(Value::Array(mut items)) => {
                    if let Some(idx) = items.iter().position(|v| v == checked) {
                        items.remove(idx);
                        form.write_value(path, Value::Array(items));
                    }
                }
                Some(value) if value == *checked => {
                    form.unset_value(path);
                }
                _ => {}
            }
        }

        if now.is_some() {
            return;
        }
        form.set_errors_at(path, Vec::new());
        if self.keep {
            return;
        }
        let residue = self.was_group
            && form.values.with(|v| {
                matches!(crate::path::get_in(v, path), Some(Value::Array(items)) if !items.is_empty())
            });
        if !residue && form.unset_value(path) {
            trace!(path, "unmounted value removed");
        }
    }
}
