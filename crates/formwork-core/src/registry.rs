#![forbid(unsafe_code)]

//! Path registry: which fields are mounted at which path.
//!
//! A path holds either a single field or a group of fields sharing the path
//! (checkbox sets, radio sets, array items). Insertion order is kept both
//! across paths and within a group; the first member of a group answers
//! path-level reads.
//!
//! # Invariants
//!
//! 1. A path entry never holds an empty group; removing the last member
//!    deletes the entry.
//! 2. Once a path becomes a group it stays a group (with the same
//!    [`GroupId`]) until its last member is removed.
//! 3. A field is stored at most once per path.

use indexmap::IndexMap;

use crate::id::{FieldId, GroupId};

/// Anything the registry can hold.
pub trait Registrant: Clone {
    fn registrant_id(&self) -> FieldId;
}

/// What a path resolves to.
#[derive(Debug, Clone)]
pub enum PathEntry<F> {
    Single(F),
    Group { id: GroupId, members: Vec<F> },
}

impl<F: Registrant> PathEntry<F> {
    /// The field that answers path-level reads.
    #[must_use]
    pub fn first(&self) -> Option<&F> {
        match self {
            PathEntry::Single(f) => Some(f),
            PathEntry::Group { members, .. } => members.first(),
        }
    }

    #[must_use]
    pub fn members(&self) -> &[F] {
        match self {
            PathEntry::Single(f) => std::slice::from_ref(f),
            PathEntry::Group { members, .. } => members,
        }
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, PathEntry::Group { .. })
    }

    #[must_use]
    pub fn identity(&self) -> EntryIdentity {
        match self {
            PathEntry::Single(f) => EntryIdentity::Field(f.registrant_id()),
            PathEntry::Group { id, .. } => EntryIdentity::Group(*id),
        }
    }

    fn contains(&self, id: FieldId) -> bool {
        self.members().iter().any(|f| f.registrant_id() == id)
    }
}

/// Identity of whatever occupies a path, used to re-check deferred work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryIdentity {
    Field(FieldId),
    Group(GroupId),
}

/// Path to field(s) map.
#[derive(Debug)]
pub struct PathRegistry<F> {
    entries: IndexMap<String, PathEntry<F>>,
}

impl<F> Default for PathRegistry<F> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<F: Registrant> PathRegistry<F> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` at `path`. A second field turns the entry into a
    /// group; later fields are appended. Re-inserting a member is a no-op.
    pub fn insert(&mut self, field: F, path: &str) {
        let id = field.registrant_id();
        let Some(entry) = self.entries.get_mut(path) else {
            self.entries
                .insert(path.to_string(), PathEntry::Single(field));
            tracing::trace!(path, field_id = id.raw(), "registry insert");
            return;
        };
        if entry.contains(id) {
            return;
        }
        match entry {
            PathEntry::Group { id: group, members } => {
                members.push(field);
                tracing::trace!(path, field_id = id.raw(), group_id = group.raw(), "registry append");
            }
            PathEntry::Single(existing) => {
                let group = GroupId::next();
                let members = vec![existing.clone(), field];
                *entry = PathEntry::Group { id: group, members };
                tracing::trace!(
                    path,
                    field_id = id.raw(),
                    group_id = group.raw(),
                    "registry group formed"
                );
            }
        }
    }

    /// Remove the field with `id` from `path`. Returns whether it was there.
    pub fn remove(&mut self, id: FieldId, path: &str) -> bool {
        let Some(entry) = self.entries.get_mut(path) else {
            return false;
        };
        let (removed, now_empty) = match entry {
            PathEntry::Single(f) => {
                let hit = f.registrant_id() == id;
                (hit, hit)
            }
            PathEntry::Group { members, .. } => {
                let before = members.len();
                members.retain(|f| f.registrant_id() != id);
                (members.len() != before, members.is_empty())
            }
        };
        if now_empty {
            self.entries.shift_remove(path);
        }
        if removed {
            tracing::trace!(path, field_id = id.raw(), emptied = now_empty, "registry remove");
        }
        removed
    }

    /// Move `field` from `old_path` to `new_path`.
    pub fn rename(&mut self, field: F, old_path: &str, new_path: &str) {
        self.remove(field.registrant_id(), old_path);
        self.insert(field, new_path);
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&PathEntry<F>> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn first(&self, path: &str) -> Option<&F> {
        self.resolve(path).and_then(PathEntry::first)
    }

    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn identity(&self, path: &str) -> Option<EntryIdentity> {
        self.resolve(path).map(PathEntry::identity)
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(path, entry)` pairs in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PathEntry<F>)> {
        self.entries.iter().map(|(p, e)| (p.as_str(), e))
    }

    /// Every registered field, across all paths.
    pub fn fields(&self) -> impl Iterator<Item = &F> {
        self.entries.values().flat_map(PathEntry::members)
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Probe(u64);

    impl Registrant for Probe {
        fn registrant_id(&self) -> FieldId {
            FieldId::from_raw(self.0)
        }
    }

    fn ids(reg: &PathRegistry<Probe>, path: &str) -> Vec<u64> {
        reg.resolve(path)
            .map(|e| e.members().iter().map(|p| p.0).collect())
            .unwrap_or_default()
    }

    #[test]
    fn single_insert_and_remove() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "name");
        assert!(matches!(reg.resolve("name"), Some(PathEntry::Single(Probe(1)))));
        assert!(reg.remove(FieldId::from_raw(1), "name"));
        assert!(!reg.exists("name"));
    }

    #[test]
    fn second_insert_forms_group_in_order() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "colors");
        reg.insert(Probe(2), "colors");
        reg.insert(Probe(3), "colors");
        assert!(reg.resolve("colors").is_some_and(PathEntry::is_group));
        assert_eq!(ids(&reg, "colors"), vec![1, 2, 3]);
        assert_eq!(reg.first("colors"), Some(&Probe(1)));
    }

    #[test]
    fn group_does_not_revert_to_single() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "colors");
        reg.insert(Probe(2), "colors");
        let before = reg.identity("colors");
        reg.remove(FieldId::from_raw(1), "colors");
        assert!(reg.resolve("colors").is_some_and(PathEntry::is_group));
        assert_eq!(reg.identity("colors"), before);
        reg.remove(FieldId::from_raw(2), "colors");
        assert!(!reg.exists("colors"));
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "a");
        assert!(!reg.remove(FieldId::from_raw(9), "a"));
        assert!(!reg.remove(FieldId::from_raw(1), "b"));
        assert!(reg.exists("a"));
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "a");
        reg.insert(Probe(1), "a");
        assert!(matches!(reg.resolve("a"), Some(PathEntry::Single(_))));
    }

    #[test]
    fn rename_moves_between_paths() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "a[0]");
        reg.rename(Probe(1), "a[0]", "a[1]");
        assert!(!reg.exists("a[0]"));
        assert_eq!(ids(&reg, "a[1]"), vec![1]);
    }

    #[test]
    fn regrouping_gets_a_new_identity() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "x");
        reg.insert(Probe(2), "x");
        let first = reg.identity("x");
        reg.remove(FieldId::from_raw(1), "x");
        reg.remove(FieldId::from_raw(2), "x");
        reg.insert(Probe(3), "x");
        reg.insert(Probe(4), "x");
        assert_ne!(reg.identity("x"), first);
    }

    #[test]
    fn fields_flattens_in_order() {
        let mut reg = PathRegistry::new();
        reg.insert(Probe(1), "a");
        reg.insert(Probe(2), "b");
        reg.insert(Probe(3), "a");
        let all: Vec<u64> = reg.fields().map(|p| p.0).collect();
        assert_eq!(all, vec![1, 3, 2]);
        assert_eq!(reg.paths().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Insert(u64),
            Remove(u64),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![(1u64..6).prop_map(Op::Insert), (1u64..6).prop_map(Op::Remove)]
        }

        proptest! {
            #[test]
            fn group_invariants_hold(ops in proptest::collection::vec(arb_op(), 0..64)) {
                let mut reg = PathRegistry::new();
                let mut model: Vec<u64> = Vec::new();
                let mut grouped = false;
                for op in ops {
                    match op {
                        Op::Insert(id) => {
                            reg.insert(Probe(id), "p");
                            if !model.contains(&id) {
                                model.push(id);
                            }
                            if model.len() > 1 {
                                grouped = true;
                            }
                        }
                        Op::Remove(id) => {
                            reg.remove(FieldId::from_raw(id), "p");
                            model.retain(|m| *m != id);
                        }
                    }
                    if model.is_empty() {
                        grouped = false;
                        prop_assert!(!reg.exists("p"));
                    } else {
                        prop_assert_eq!(ids(&reg, "p"), model.clone());
                        let is_group = reg.resolve("p").is_some_and(PathEntry::is_group);
                        prop_assert_eq!(is_group, grouped);
                    }
                }
            }
        }
    }
}
