#![forbid(unsafe_code)]

//! Process-wide identifiers for forms, fields and path groups.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FORM: AtomicU64 = AtomicU64::new(1);
static NEXT_FIELD: AtomicU64 = AtomicU64::new(1);
static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Allocate the next identifier. Identifiers are never reused.
            #[must_use]
            pub fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            /// Create an identifier from a raw value (for tests and tooling).
            #[must_use]
            pub const fn from_raw(value: u64) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// Identity of a form instance.
    FormId,
    NEXT_FORM,
    "Form"
);
define_id!(
    /// Stable identity of a field, assigned at creation.
    FieldId,
    NEXT_FIELD,
    "Field"
);
define_id!(
    /// Identity of a path group. A group keeps its id for as long as any
    /// member stays registered at the path.
    GroupId,
    NEXT_GROUP,
    "Group"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let a = FieldId::next();
        let b = FieldId::next();
        assert!(b > a);
    }

    #[test]
    fn display_includes_kind() {
        assert_eq!(FieldId::from_raw(7).to_string(), "Field(7)");
        assert_eq!(GroupId::from_raw(3).to_string(), "Group(3)");
    }
}
