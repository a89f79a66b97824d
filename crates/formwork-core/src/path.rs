#![forbid(unsafe_code)]

//! Path addressing into the value tree.
//!
//! Paths use dots for object keys and brackets for indices:
//! `user.emails[0]`, `rows[2].name`. A path wrapped entirely in brackets,
//! such as `[user.name]`, is a single literal key and is never split.
//!
//! All mutation of the value tree goes through [`set_in`] and [`unset_in`].

use serde_json::{Map, Value};

/// Largest array index a write may address. Writes that would grow an array
/// past it are rejected.
pub const MAX_ARRAY_INDEX: usize = 65_535;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn as_key(&self) -> String {
        match self {
            Self::Key(k) => k.clone(),
            Self::Index(i) => i.to_string(),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            Self::Key(k) => k.parse().ok(),
            Self::Index(i) => Some(*i),
        }
    }
}

/// Whether `path` is a bracketed literal key (`[a.b]`).
#[must_use]
pub fn is_literal(path: &str) -> bool {
    let Some(inner) = path.strip_prefix('[').and_then(|p| p.strip_suffix(']')) else {
        return false;
    };
    !inner.is_empty()
        && !inner.contains(['[', ']'])
        && !inner.bytes().all(|b| b.is_ascii_digit())
}

/// Split a path into segments. Empty segments are dropped.
#[must_use]
pub fn parse(path: &str) -> Vec<Segment> {
    if is_literal(path) {
        return vec![Segment::Key(path[1..path.len() - 1].to_string())];
    }

    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '.' => flush_key(&mut buf, &mut segments),
            '[' => {
                flush_key(&mut buf, &mut segments);
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let inner = inner.trim_matches(|c| c == '"' || c == '\'');
                match inner.parse::<usize>() {
                    Ok(idx) => segments.push(Segment::Index(idx)),
                    Err(_) if !inner.is_empty() => segments.push(Segment::Key(inner.to_string())),
                    Err(_) => {}
                }
            }
            _ => buf.push(c),
        }
    }
    flush_key(&mut buf, &mut segments);
    segments
}

fn flush_key(buf: &mut String, segments: &mut Vec<Segment>) {
    if !buf.is_empty() {
        segments.push(Segment::Key(std::mem::take(buf)));
    }
}

/// `path[index]`.
#[must_use]
pub fn join_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// Read the value at `path`. The empty path addresses the root.
#[must_use]
pub fn get_in<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    parse(path)
        .iter()
        .try_fold(root, |node, seg| child(node, seg))
}

fn child<'a>(node: &'a Value, seg: &Segment) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(&seg.as_key()),
        Value::Array(items) => seg.as_index().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, seg: &Segment) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(&seg.as_key()),
        Value::Array(items) => seg.as_index().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn fits(node: &Value, seg: &Segment) -> bool {
    match node {
        Value::Object(_) => true,
        Value::Array(_) => seg.as_index().is_some(),
        _ => false,
    }
}

fn slot<'a>(node: &'a mut Value, seg: &Segment) -> &'a mut Value {
    if !fits(node, seg) {
        *node = match seg {
            Segment::Index(_) => Value::Array(Vec::new()),
            Segment::Key(_) => Value::Object(Map::new()),
        };
    }
    match node {
        Value::Object(map) => map.entry(seg.as_key()).or_insert(Value::Null),
        Value::Array(items) => {
            let idx = seg.as_index().unwrap_or_default();
            if items.len() <= idx {
                items.resize(idx + 1, Value::Null);
            }
            &mut items[idx]
        }
        // scalars were replaced by a container above
        other => other,
    }
}

/// Write `value` at `path`, creating intermediate containers. A missing
/// container becomes an array when the segment is an index, an object
/// otherwise. The empty path replaces the root.
///
/// Returns false, leaving `root` untouched, when the write would index an
/// array past [`MAX_ARRAY_INDEX`].
pub fn set_in(root: &mut Value, path: &str, value: Value) -> bool {
    let segments = parse(path);
    if indexes_too_far(root, &segments) {
        return false;
    }
    let target = segments.iter().fold(root, |node, seg| slot(node, seg));
    *target = value;
    true
}

/// Walk `segments` the way [`slot`] would and report any array index above
/// the cap.
fn indexes_too_far(root: &Value, segments: &[Segment]) -> bool {
    let mut node = Some(root);
    for seg in segments {
        let lands_in_array = match node {
            Some(Value::Array(_)) => seg.as_index().is_some(),
            Some(Value::Object(_)) => false,
            _ => matches!(seg, Segment::Index(_)),
        };
        if lands_in_array && seg.as_index().is_some_and(|i| i > MAX_ARRAY_INDEX) {
            return true;
        }
        node = node.and_then(|n| child(n, seg));
    }
    false
}

/// Remove the value at `path`, then prune any parent containers the removal
/// left empty. Array elements are spliced out. Returns whether a value was
/// removed.
pub fn unset_in(root: &mut Value, path: &str) -> bool {
    let segments = parse(path);
    if segments.is_empty() {
        return false;
    }
    unset_rec(root, &segments)
}

fn unset_rec(node: &mut Value, segments: &[Segment]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return remove_child(node, first);
    }
    let Some(next) = child_mut(node, first) else {
        return false;
    };
    let removed = unset_rec(next, rest);
    if removed && is_empty_container(next) {
        remove_child(node, first);
    }
    removed
}

fn remove_child(node: &mut Value, seg: &Segment) -> bool {
    match node {
        Value::Object(map) => map.shift_remove(&seg.as_key()).is_some(),
        Value::Array(items) => match seg.as_index() {
            Some(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// `{}` or `[]`.
#[must_use]
pub fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Copy every path in `paths` from `source` into a fresh tree.
#[must_use]
pub fn pick<'a>(source: &Value, paths: impl IntoIterator<Item = &'a str>) -> Value {
    let mut out = Value::Object(Map::new());
    for path in paths {
        if let Some(value) = get_in(source, path) {
            set_in(&mut out, path, value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_dots_and_brackets() {
        assert_eq!(
            parse("user.emails[0].address"),
            vec![
                Segment::Key("user".into()),
                Segment::Key("emails".into()),
                Segment::Index(0),
                Segment::Key("address".into()),
            ]
        );
        assert_eq!(parse(""), Vec::<Segment>::new());
        assert_eq!(parse("a['b']"), vec![Segment::Key("a".into()), Segment::Key("b".into())]);
    }

    #[test]
    fn bracketed_path_is_literal() {
        assert!(is_literal("[user.name]"));
        assert!(!is_literal("[0]"));
        assert!(!is_literal("a[0]"));
        let mut root = json!({});
        set_in(&mut root, "[user.name]", json!("x"));
        assert_eq!(root, json!({"user.name": "x"}));
        assert_eq!(get_in(&root, "[user.name]"), Some(&json!("x")));
    }

    #[test]
    fn set_creates_objects_and_arrays() {
        let mut root = json!({});
        set_in(&mut root, "a.b[1].c", json!(5));
        assert_eq!(root, json!({"a": {"b": [null, {"c": 5}]}}));
    }

    #[test]
    fn set_replaces_scalars_on_the_way() {
        let mut root = json!({"a": 1});
        set_in(&mut root, "a.b", json!(true));
        assert_eq!(root, json!({"a": {"b": true}}));
    }

    #[test]
    fn set_rejects_runaway_indices() {
        let mut root = json!({"a": [1]});
        assert!(!set_in(&mut root, "a[18446744073709551615]", json!(1)));
        assert!(!set_in(&mut root, "b[4000000000].c", json!(1)));
        assert!(!set_in(&mut root, "a.70000", json!(1)));
        assert_eq!(root, json!({"a": [1]}));

        assert!(set_in(&mut root, "n.70000", json!(1)));
        assert_eq!(root["n"], json!({"70000": 1}));
        assert!(set_in(&mut root, "a[2]", json!(3)));
        assert_eq!(root["a"], json!([1, null, 3]));
    }

    #[test]
    fn set_empty_path_replaces_root() {
        let mut root = json!({"a": 1});
        set_in(&mut root, "", json!([1]));
        assert_eq!(root, json!([1]));
    }

    #[test]
    fn get_numeric_key_on_array() {
        let root = json!({"a": [10, 20]});
        assert_eq!(get_in(&root, "a.1"), Some(&json!(20)));
        assert_eq!(get_in(&root, "a[2]"), None);
        assert_eq!(get_in(&root, "a.x"), None);
    }

    #[test]
    fn unset_prunes_empty_parents() {
        let mut root = json!({"user": {"profile": {"name": "x"}}, "keep": 1});
        assert!(unset_in(&mut root, "user.profile.name"));
        assert_eq!(root, json!({"keep": 1}));
    }

    #[test]
    fn unset_keeps_sibling_key_order() {
        let mut root = json!({"z": 1, "a": 2, "m": 3});
        assert!(unset_in(&mut root, "a"));
        let keys: Vec<&str> = root
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(keys, vec!["z", "m"]);
    }

    #[test]
    fn unset_splices_array_items() {
        let mut root = json!({"a": [1, 2, 3]});
        assert!(unset_in(&mut root, "a[1]"));
        assert_eq!(root, json!({"a": [1, 3]}));
    }

    #[test]
    fn unset_missing_is_noop() {
        let mut root = json!({"a": {"b": 1}});
        assert!(!unset_in(&mut root, "a.c"));
        assert!(!unset_in(&mut root, "x.y"));
        assert_eq!(root, json!({"a": {"b": 1}}));
    }

    #[test]
    fn pick_copies_only_listed_paths() {
        let source = json!({"a": 1, "b": {"c": 2, "d": 3}});
        assert_eq!(pick(&source, ["b.c", "missing"]), json!({"b": {"c": 2}}));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_path() -> impl Strategy<Value = String> {
            proptest::collection::vec(
                prop_oneof![
                    "[a-z]{1,3}".prop_map(|k| format!(".{k}")),
                    (0usize..4).prop_map(|i| format!("[{i}]")),
                ],
                1..5,
            )
            .prop_map(|parts| format!("root{}", parts.concat()))
        }

        proptest! {
            #[test]
            fn set_then_get_returns_value(path in arb_path(), n in any::<i64>()) {
                let mut root = json!({});
                set_in(&mut root, &path, json!(n));
                prop_assert_eq!(get_in(&root, &path), Some(&json!(n)));
            }

            #[test]
            fn set_then_unset_leaves_no_value(path in arb_path()) {
                let mut root = json!({"other": true});
                set_in(&mut root, &path, json!("v"));
                prop_assert!(unset_in(&mut root, &path));
                prop_assert!(get_in(&root, &path) != Some(&json!("v")));
            }
        }
    }
}
