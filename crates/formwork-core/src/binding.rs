#![forbid(unsafe_code)]

//! Lightweight two-way bindings to a path, without registering a field.
//!
//! Bound paths count as controlled: they are included in
//! [`FormContext::controlled_values`].

use std::fmt;
use std::rc::Weak;

use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::form::{FormContext, FormInner};

#[derive(Clone)]
pub struct PathBinding {
    form: Weak<FormInner>,
    path: String,
}

impl fmt::Debug for PathBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathBinding")
            .field("path", &self.path)
            .field("live", &(self.form.strong_count() > 0))
            .finish()
    }
}

impl PathBinding {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.form
            .upgrade()
            .and_then(|inner| FormContext::from_inner(inner).value_at(&self.path))
    }

    /// Write through [`FormContext::set_field_value`], so checkbox groups
    /// toggle.
    pub fn set(&self, value: Value) -> FormResult<()> {
        let inner = self.form.upgrade().ok_or(FormError::FormDropped)?;
        FormContext::from_inner(inner).set_field_value(&self.path, value);
        Ok(())
    }
}

impl FormContext {
    pub fn bind(&self, path: impl Into<String>) -> PathBinding {
        let path = path.into();
        self.inner.bound_paths.borrow_mut().insert(path.clone());
        PathBinding {
            form: self.downgrade(),
            path,
        }
    }
}
