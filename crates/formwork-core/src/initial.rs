#![forbid(unsafe_code)]

//! Initial-values store.
//!
//! Two snapshots of the same shape:
//!
//! - `current`: the baseline for dirty checks. Late-mounting fields and
//!   field-array inserts stage their starting values here so they do not
//!   read as edits.
//! - `original`: changes only through an explicit
//!   [`set`](InitialValues::set) (or a reset with new values). Resets replay
//!   from it.

use serde_json::{Map, Value};

use crate::path;

#[derive(Debug, Clone, PartialEq)]
pub struct InitialValues {
    current: Value,
    original: Value,
}

impl Default for InitialValues {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl InitialValues {
    #[must_use]
    pub fn new(values: Value) -> Self {
        Self {
            current: values.clone(),
            original: values,
        }
    }

    #[must_use]
    pub fn current(&self) -> &Value {
        &self.current
    }

    #[must_use]
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// Replace both snapshots.
    pub fn set(&mut self, values: Value) {
        self.current = values.clone();
        self.original = values;
    }

    /// Drop everything staged since the last [`set`](Self::set).
    pub fn restore_current(&mut self) {
        self.current = self.original.clone();
    }

    #[must_use]
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        path::get_in(&self.current, path)
    }

    #[must_use]
    pub fn original_at(&self, path: &str) -> Option<&Value> {
        path::get_in(&self.original, path)
    }

    /// Write `value` at `path` in `current`, and in `original` too when
    /// `update_original` is set.
    pub fn stage(&mut self, path: &str, value: Value, update_original: bool) {
        if update_original {
            path::set_in(&mut self.original, path, value.clone());
        }
        path::set_in(&mut self.current, path, value);
    }

    /// Insert `value` at `index` of the array at `array_path` in `current`,
    /// shifting later items. A missing or non-array value becomes an array.
    pub fn insert_item(&mut self, array_path: &str, index: usize, value: Value) {
        let mut items = match path::get_in(&self.current, array_path) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let index = index.min(items.len());
        items.insert(index, value);
        path::set_in(&mut self.current, array_path, Value::Array(items));
    }

    /// Remove the item at `index` of the array at `array_path` in `current`.
    pub fn remove_item(&mut self, array_path: &str, index: usize) {
        if let Some(Value::Array(items)) = path::get_in(&self.current, array_path)
            && index < items.len()
        {
            let mut items = items.clone();
            items.remove(index);
            path::set_in(&mut self.current, array_path, Value::Array(items));
        }
    }

    /// Swap two items of the array at `array_path` in `current`.
    pub fn swap_items(&mut self, array_path: &str, a: usize, b: usize) {
        if let Some(Value::Array(items)) = path::get_in(&self.current, array_path)
            && a < items.len()
            && b < items.len()
        {
            let mut items = items.clone();
            items.swap(a, b);
            path::set_in(&mut self.current, array_path, Value::Array(items));
        }
    }

    /// Move an item of the array at `array_path` in `current`.
    pub fn move_item(&mut self, array_path: &str, from: usize, to: usize) {
        if let Some(Value::Array(items)) = path::get_in(&self.current, array_path)
            && from < items.len()
            && to < items.len()
        {
            let mut items = items.clone();
            let item = items.remove(from);
            items.insert(to, item);
            path::set_in(&mut self.current, array_path, Value::Array(items));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_clones_into_both() {
        let mut init = InitialValues::default();
        init.set(json!({"a": 1}));
        assert_eq!(init.current(), &json!({"a": 1}));
        assert_eq!(init.original(), &json!({"a": 1}));
    }

    #[test]
    fn stage_current_only_by_default() {
        let mut init = InitialValues::new(json!({"a": 1}));
        init.stage("b", json!(2), false);
        assert_eq!(init.value_at("b"), Some(&json!(2)));
        assert_eq!(init.original_at("b"), None);
        init.restore_current();
        assert_eq!(init.value_at("b"), None);
    }

    #[test]
    fn stage_with_original() {
        let mut init = InitialValues::default();
        init.stage("x.y", json!(true), true);
        assert_eq!(init.original_at("x.y"), Some(&json!(true)));
    }

    #[test]
    fn array_item_staging_shifts() {
        let mut init = InitialValues::new(json!({"rows": ["a", "c"]}));
        init.insert_item("rows", 1, json!("b"));
        assert_eq!(init.value_at("rows"), Some(&json!(["a", "b", "c"])));
        init.move_item("rows", 0, 2);
        assert_eq!(init.value_at("rows"), Some(&json!(["b", "c", "a"])));
        init.swap_items("rows", 0, 1);
        assert_eq!(init.value_at("rows"), Some(&json!(["c", "b", "a"])));
        init.remove_item("rows", 0);
        assert_eq!(init.value_at("rows"), Some(&json!(["b", "a"])));
        init.remove_item("rows", 9);
        assert_eq!(init.value_at("rows"), Some(&json!(["b", "a"])));
        assert_eq!(init.original(), &json!({"rows": ["a", "c"]}));
    }

    #[test]
    fn insert_into_missing_array_creates_it() {
        let mut init = InitialValues::default();
        init.insert_item("tags", 5, json!("x"));
        assert_eq!(init.value_at("tags"), Some(&json!(["x"])));
    }
}
