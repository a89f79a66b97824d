#![forbid(unsafe_code)]

//! Per-path validation messages.

use indexmap::IndexMap;

/// Ordered map of path to messages. An empty message list is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBag {
    entries: IndexMap<String, Vec<String>>,
}

impl ErrorBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the messages at `path`. An empty list removes the entry.
    /// Returns whether the bag changed.
    pub fn set(&mut self, path: &str, messages: Vec<String>) -> bool {
        if messages.is_empty() {
            return self.clear_path(path);
        }
        match self.entries.get_mut(path) {
            Some(existing) if *existing == messages => false,
            Some(existing) => {
                *existing = messages;
                true
            }
            None => {
                self.entries.insert(path.to_string(), messages);
                true
            }
        }
    }

    pub fn clear_path(&mut self, path: &str) -> bool {
        self.entries.shift_remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, path: &str) -> &[String] {
        self.entries.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn first(&self, path: &str) -> Option<&str> {
        self.get(path).first().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// One message per path: the first.
    #[must_use]
    pub fn first_errors(&self) -> IndexMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(path, messages)| Some((path.clone(), messages.first()?.clone())))
            .collect()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(p, m)| (p.as_str(), m.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<P: Into<String>> FromIterator<(P, Vec<String>)> for ErrorBag {
    fn from_iter<I: IntoIterator<Item = (P, Vec<String>)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (path, messages) in iter {
            bag.set(&path.into(), messages);
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_removes_entry() {
        let mut bag = ErrorBag::new();
        assert!(bag.set("email", msgs(&["required"])));
        assert!(bag.contains("email"));
        assert!(bag.set("email", Vec::new()));
        assert!(!bag.contains("email"));
        assert!(bag.is_empty());
    }

    #[test]
    fn same_messages_report_no_change() {
        let mut bag = ErrorBag::new();
        bag.set("a", msgs(&["x"]));
        assert!(!bag.set("a", msgs(&["x"])));
        assert!(bag.set("a", msgs(&["y"])));
    }

    #[test]
    fn first_errors_keeps_order() {
        let bag: ErrorBag = [
            ("b", msgs(&["b1", "b2"])),
            ("a", msgs(&["a1"])),
            ("c", Vec::new()),
        ]
        .into_iter()
        .collect();
        let first = bag.first_errors();
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            vec![
                (&"b".to_string(), &"b1".to_string()),
                (&"a".to_string(), &"a1".to_string()),
            ]
        );
        assert_eq!(bag.first("b"), Some("b1"));
        assert!(bag.get("c").is_empty());
    }
}
