#![forbid(unsafe_code)]

//! Error types for form operations.
//!
//! Validation failures are not errors: they travel as data in
//! [`FieldValidation`](crate::scheduler::FieldValidation) and
//! [`FormValidation`](crate::scheduler::FormValidation). `FormError` covers
//! lookups and structural operations that could not be carried out.
//!
//! | Variant | Raised by | Public-surface behavior |
//! |---------|-----------|-------------------------|
//! | `FieldNotFound` | `try_field`, `validate_field`, `reset_field` | logged, benign result |
//! | `NotAnArray` | field array mutations | logged, no mutation |
//! | `IndexOutOfBounds` | field array mutations | logged, no mutation |
//! | `FormDropped` | handles outliving their form | logged, no mutation |

use std::fmt;

/// Errors that can occur while operating on a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// No field is registered at the path.
    FieldNotFound { path: String },
    /// A field array was asked to operate on a value that is not an array.
    NotAnArray { path: String },
    /// A field array index does not address an existing item.
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
    /// The form behind a field, array or binding handle was dropped.
    FormDropped,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::FieldNotFound { path } => write!(f, "no field registered at `{path}`"),
            FormError::NotAnArray { path } => write!(f, "value at `{path}` is not an array"),
            FormError::IndexOutOfBounds { path, index, len } => {
                write!(f, "index {index} out of bounds for `{path}` (len {len})")
            }
            FormError::FormDropped => write!(f, "form was dropped"),
        }
    }
}

impl std::error::Error for FormError {}

/// Result type for form operations.
pub type FormResult<T> = Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_path() {
        let err = FormError::FieldNotFound {
            path: "user.email".into(),
        };
        assert_eq!(err.to_string(), "no field registered at `user.email`");

        let err = FormError::IndexOutOfBounds {
            path: "rows".into(),
            index: 4,
            len: 2,
        };
        assert_eq!(err.to_string(), "index 4 out of bounds for `rows` (len 2)");
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&FormError::FormDropped);
    }
}
