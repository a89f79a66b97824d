#![forbid(unsafe_code)]

//! Form and field configuration.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::schema::{FieldRules, Schema};

/// Debounce window for batched schema validation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5);

/// Configuration for [`FormContext::new`](crate::form::FormContext::new).
#[derive(Clone)]
pub struct FormConfig {
    /// Starting value tree.
    pub initial_values: Value,
    /// Messages present before the first validation run, one per path.
    pub initial_errors: IndexMap<String, String>,
    /// Touched state applied to fields as they register.
    pub initial_touched: IndexMap<String, bool>,
    /// Run a full (force) validation at mount instead of a silent one.
    pub validate_on_mount: bool,
    /// Default for fields without their own keep-value setting.
    pub keep_values_on_unmount: bool,
    pub debounce: Duration,
    pub schema: Option<Rc<dyn Schema>>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            initial_values: Value::Object(Map::new()),
            initial_errors: IndexMap::new(),
            initial_touched: IndexMap::new(),
            validate_on_mount: false,
            keep_values_on_unmount: false,
            debounce: DEFAULT_DEBOUNCE,
            schema: None,
        }
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("initial_values", &self.initial_values)
            .field("initial_errors", &self.initial_errors)
            .field("initial_touched", &self.initial_touched)
            .field("validate_on_mount", &self.validate_on_mount)
            .field("keep_values_on_unmount", &self.keep_values_on_unmount)
            .field("debounce", &self.debounce)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl FormConfig {
    #[must_use]
    pub fn with_initial_values(mut self, values: Value) -> Self {
        self.initial_values = values;
        self
    }

    #[must_use]
    pub fn with_initial_error(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.initial_errors.insert(path.into(), message.into());
        self
    }

    #[must_use]
    pub fn with_initial_touched(mut self, path: impl Into<String>, touched: bool) -> Self {
        self.initial_touched.insert(path.into(), touched);
        self
    }

    #[must_use]
    pub fn with_validate_on_mount(mut self, enabled: bool) -> Self {
        self.validate_on_mount = enabled;
        self
    }

    #[must_use]
    pub fn with_keep_values_on_unmount(mut self, keep: bool) -> Self {
        self.keep_values_on_unmount = keep;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schema = Some(Rc::new(schema));
        self
    }
}

/// Input semantics of a field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldKind {
    #[default]
    Default,
    /// Toggles `checked_value` in and out of the path value. Alone at its
    /// path the value flips between `checked_value` and `unchecked_value`
    /// (`None` removes the value).
    Checkbox {
        checked_value: Value,
        unchecked_value: Option<Value>,
    },
    /// Selecting writes `checked_value` to the path.
    Radio { checked_value: Value },
}

impl FieldKind {
    #[must_use]
    pub fn checked_value(&self) -> Option<&Value> {
        match self {
            FieldKind::Default => None,
            FieldKind::Checkbox { checked_value, .. } | FieldKind::Radio { checked_value } => {
                Some(checked_value)
            }
        }
    }

    #[must_use]
    pub fn is_checkbox(&self) -> bool {
        matches!(self, FieldKind::Checkbox { .. })
    }
}

/// Options for [`FormContext::register_field`](crate::form::FormContext::register_field).
#[derive(Clone)]
pub struct FieldOptions {
    pub path: String,
    pub kind: FieldKind,
    pub rules: Option<Rc<dyn FieldRules>>,
    /// Starting value; takes precedence over the form's value at the path.
    pub initial_value: Option<Value>,
    /// Overrides the form default when set.
    pub keep_value_on_unmount: Option<bool>,
    pub label: Option<String>,
    /// Value changes surface errors (true) or only refresh `valid` (false).
    pub validate_on_value_update: bool,
    /// Surface errors right after mounting.
    pub validate_on_mount: bool,
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("rules", &self.rules.is_some())
            .field("initial_value", &self.initial_value)
            .field("keep_value_on_unmount", &self.keep_value_on_unmount)
            .field("label", &self.label)
            .field("validate_on_value_update", &self.validate_on_value_update)
            .field("validate_on_mount", &self.validate_on_mount)
            .finish()
    }
}

impl FieldOptions {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldKind::Default,
            rules: None,
            initial_value: None,
            keep_value_on_unmount: None,
            label: None,
            validate_on_value_update: true,
            validate_on_mount: false,
        }
    }

    #[must_use]
    pub fn checkbox(mut self, checked_value: Value) -> Self {
        self.kind = FieldKind::Checkbox {
            checked_value,
            unchecked_value: None,
        };
        self
    }

    /// Only meaningful after [`checkbox`](Self::checkbox).
    #[must_use]
    pub fn with_unchecked_value(mut self, value: Value) -> Self {
        if let FieldKind::Checkbox {
            unchecked_value, ..
        } = &mut self.kind
        {
            *unchecked_value = Some(value);
        }
        self
    }

    #[must_use]
    pub fn radio(mut self, checked_value: Value) -> Self {
        self.kind = FieldKind::Radio { checked_value };
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: impl FieldRules + 'static) -> Self {
        self.rules = Some(Rc::new(rules));
        self
    }

    #[must_use]
    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_keep_value_on_unmount(mut self, keep: bool) -> Self {
        self.keep_value_on_unmount = Some(keep);
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_validate_on_value_update(mut self, enabled: bool) -> Self {
        self.validate_on_value_update = enabled;
        self
    }

    #[must_use]
    pub fn with_validate_on_mount(mut self, enabled: bool) -> Self {
        self.validate_on_mount = enabled;
        self
    }
}
