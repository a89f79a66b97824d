#![forbid(unsafe_code)]

//! Keyed list editing over an array value.
//!
//! Each item carries a stable key so a renderer can keep per-item state
//! across reorders. Inserts and removals also shift the staged initial
//! array, so inserted rows do not read as edits and surviving rows keep
//! their baseline.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{FormError, FormResult};
use crate::form::{FormContext, FormInner};
use crate::path;
use crate::scheduler::ValidationMode;

/// One array item as seen by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub key: u64,
    pub index: usize,
    pub value: Value,
    pub is_first: bool,
    pub is_last: bool,
}

pub(crate) struct FieldArrayInner {
    path: String,
    form: Weak<FormInner>,
    keys: RefCell<Vec<u64>>,
    next_key: Cell<u64>,
}

impl FieldArrayInner {
    fn fresh_key(&self) -> u64 {
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        key
    }

    /// Keep one key per item when the array changed behind our back.
    fn sync_keys(&self, len: usize) {
        let mut keys = self.keys.borrow_mut();
        keys.truncate(len);
        while keys.len() < len {
            let key = self.fresh_key();
            keys.push(key);
        }
    }

    pub(crate) fn regenerate(&self, form: &FormContext) {
        let len = match form.value_at(&self.path) {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        };
        let keys = (0..len).map(|_| self.fresh_key()).collect();
        *self.keys.borrow_mut() = keys;
    }
}

/// Handle returned by [`FormContext::field_array`].
#[derive(Clone)]
pub struct FieldArray {
    inner: Rc<FieldArrayInner>,
}

impl fmt::Debug for FieldArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArray")
            .field("path", &self.inner.path)
            .field("keys", &*self.inner.keys.borrow())
            .finish()
    }
}

impl FieldArray {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    fn form(&self) -> FormResult<FormContext> {
        self.inner
            .form
            .upgrade()
            .map(FormContext::from_inner)
            .ok_or(FormError::FormDropped)
    }

    fn items(&self, form: &FormContext) -> FormResult<Vec<Value>> {
        match form.value_at(&self.inner.path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => {
                warn!(path = %self.inner.path, "field array over a non-array value");
                Err(FormError::NotAnArray {
                    path: self.inner.path.clone(),
                })
            }
        }
    }

    fn check_index(&self, index: usize, len: usize) -> FormResult<()> {
        if index < len {
            return Ok(());
        }
        warn!(path = %self.inner.path, index, len, "field array index out of bounds");
        Err(FormError::IndexOutOfBounds {
            path: self.inner.path.clone(),
            index,
            len,
        })
    }

    fn commit(&self, form: &FormContext, items: Vec<Value>, op: &'static str) {
        let len = items.len();
        form.inner.write_value(&self.inner.path, Value::Array(items));
        form.inner.request_form(ValidationMode::Silent);
        debug!(path = %self.inner.path, op, len, "field array updated");
    }

    /// Current items with their keys.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldEntry> {
        let Ok(form) = self.form() else {
            return Vec::new();
        };
        let items = self.items(&form).unwrap_or_default();
        self.inner.sync_keys(items.len());
        let keys = self.inner.keys.borrow();
        let last = items.len().saturating_sub(1);
        items
            .into_iter()
            .enumerate()
            .map(|(index, value)| FieldEntry {
                key: keys[index],
                index,
                value,
                is_first: index == 0,
                is_last: index == last,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: Value) -> FormResult<()> {
        let form = self.form()?;
        let len = self.items(&form)?.len();
        self.insert_at(&form, len, value, "push")
    }

    pub fn prepend(&self, value: Value) -> FormResult<()> {
        let form = self.form()?;
        self.items(&form)?;
        self.insert_at(&form, 0, value, "prepend")
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert(&self, index: usize, value: Value) -> FormResult<()> {
        let form = self.form()?;
        let len = self.items(&form)?.len();
        self.check_index(index, len + 1)?;
        self.insert_at(&form, index, value, "insert")
    }

    fn insert_at(&self, form: &FormContext, index: usize, value: Value, op: &'static str) -> FormResult<()> {
        let mut items = self.items(form)?;
        self.inner.sync_keys(items.len());
        let key = self.inner.fresh_key();
        self.inner.keys.borrow_mut().insert(index, key);
        items.insert(index, value.clone());
        form.inner
            .initial
            .update(|initial| initial.insert_item(&self.inner.path, index, value));
        self.commit(form, items, op);
        Ok(())
    }

    pub fn remove(&self, index: usize) -> FormResult<()> {
        let form = self.form()?;
        let mut items = self.items(&form)?;
        self.check_index(index, items.len())?;
        self.inner.sync_keys(items.len());
        self.inner.keys.borrow_mut().remove(index);
        items.remove(index);
        form.inner
            .initial
            .update(|initial| initial.remove_item(&self.inner.path, index));
        self.commit(&form, items, "remove");
        Ok(())
    }

    pub fn swap(&self, a: usize, b: usize) -> FormResult<()> {
        let form = self.form()?;
        let mut items = self.items(&form)?;
        self.check_index(a, items.len())?;
        self.check_index(b, items.len())?;
        self.inner.sync_keys(items.len());
        self.inner.keys.borrow_mut().swap(a, b);
        items.swap(a, b);
        self.commit(&form, items, "swap");
        Ok(())
    }

    pub fn move_item(&self, from: usize, to: usize) -> FormResult<()> {
        let form = self.form()?;
        let mut items = self.items(&form)?;
        self.check_index(from, items.len())?;
        self.check_index(to, items.len())?;
        self.inner.sync_keys(items.len());
        {
            let mut keys = self.inner.keys.borrow_mut();
            let key = keys.remove(from);
            keys.insert(to, key);
        }
        let item = items.remove(from);
        items.insert(to, item);
        self.commit(&form, items, "move");
        Ok(())
    }

    /// Replace every item; all keys are regenerated.
    pub fn replace(&self, items: Vec<Value>) -> FormResult<()> {
        let form = self.form()?;
        let keys = items.iter().map(|_| self.inner.fresh_key()).collect();
        *self.inner.keys.borrow_mut() = keys;
        self.commit(&form, items, "replace");
        Ok(())
    }

    /// Overwrite one item in place; its key is kept.
    pub fn update(&self, index: usize, value: Value) -> FormResult<()> {
        let form = self.form()?;
        let len = self.items(&form)?.len();
        self.check_index(index, len)?;
        form.inner
            .write_value(&path::join_index(&self.inner.path, index), value);
        Ok(())
    }

    /// Rebuild keys from the current value.
    pub fn reset(&self) {
        if let Ok(form) = self.form() {
            self.inner.regenerate(&form);
        }
    }
}

impl FormContext {
    /// Keyed list handle over the array at `path`. Keys are regenerated
    /// whenever the whole value tree is replaced or reset.
    pub fn field_array(&self, path: impl Into<String>) -> FieldArray {
        let inner = Rc::new(FieldArrayInner {
            path: path.into(),
            form: self.downgrade(),
            keys: RefCell::new(Vec::new()),
            next_key: Cell::new(0),
        });
        inner.regenerate(self);
        self.inner.arrays.borrow_mut().push(Rc::downgrade(&inner));
        debug!(form_id = self.id().raw(), path = %inner.path, "field array created");
        FieldArray { inner }
    }
}
