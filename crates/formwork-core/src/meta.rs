#![forbid(unsafe_code)]

//! Field and form meta flags.
//!
//! Form-level flags are folded from every registered field with a fixed
//! merge table:
//!
//! | Flag | Strategy |
//! |------|----------|
//! | touched | [`MergeStrategy::Some`] |
//! | pending | [`MergeStrategy::Some`] |
//! | valid | [`MergeStrategy::Every`] |
//!
//! `dirty` compares the live value tree with the `current` initial snapshot
//! and the exposed `valid` additionally requires an empty error bag.

use serde_json::Value;

/// How per-field booleans fold into one form flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// True if any field is true.
    Some,
    /// True if every field is true (vacuously true without fields).
    Every,
}

impl MergeStrategy {
    pub fn merge(self, flags: impl IntoIterator<Item = bool>) -> bool {
        let mut flags = flags.into_iter();
        match self {
            MergeStrategy::Some => flags.any(|f| f),
            MergeStrategy::Every => flags.all(|f| f),
        }
    }
}

/// Merge strategy per aggregated flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeTable {
    pub touched: MergeStrategy,
    pub pending: MergeStrategy,
    pub valid: MergeStrategy,
}

pub const MERGE_TABLE: MergeTable = MergeTable {
    touched: MergeStrategy::Some,
    pending: MergeStrategy::Some,
    valid: MergeStrategy::Every,
};

/// Mutable per-field flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags {
    pub touched: bool,
    pub pending: bool,
    pub valid: bool,
    /// Set once the field's errors have been surfaced by a non-silent run.
    pub validated: bool,
}

impl Default for FieldFlags {
    fn default() -> Self {
        Self {
            touched: false,
            pending: false,
            valid: true,
            validated: false,
        }
    }
}

/// Snapshot of one field's meta.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub touched: bool,
    pub pending: bool,
    pub valid: bool,
    pub validated: bool,
    pub dirty: bool,
    pub initial_value: Option<Value>,
}

/// Aggregated form meta.
#[derive(Debug, Clone, PartialEq)]
pub struct FormMeta {
    pub touched: bool,
    pub pending: bool,
    pub valid: bool,
    pub dirty: bool,
    pub initial_values: Value,
}

impl Default for FormMeta {
    fn default() -> Self {
        Self {
            touched: false,
            pending: false,
            valid: true,
            dirty: false,
            initial_values: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Fold field flags into form meta.
#[must_use]
pub fn aggregate(
    fields: &[FieldFlags],
    errors_empty: bool,
    values: &Value,
    initial_current: &Value,
) -> FormMeta {
    let fold = |strategy: MergeStrategy, pick: fn(&FieldFlags) -> bool| {
        strategy.merge(fields.iter().map(pick))
    };
    FormMeta {
        touched: fold(MERGE_TABLE.touched, |f| f.touched),
        pending: fold(MERGE_TABLE.pending, |f| f.pending),
        valid: fold(MERGE_TABLE.valid, |f| f.valid) && errors_empty,
        dirty: values != initial_current,
        initial_values: initial_current.clone(),
    }
}
