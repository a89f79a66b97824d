#![forbid(unsafe_code)]

//! Form-state engine for formwork.
//!
//! # Role in formwork
//! `formwork-core` keeps the state of one form: a JSON value tree addressed
//! by paths, per-path validation messages, initial-value snapshots for dirty
//! tracking, and the set of mounted fields. It knows nothing about
//! rendering; a UI layer registers fields, forwards input events and reads
//! values, errors and meta back.
//!
//! # Primary responsibilities
//! - **Value tree**: [`path`] parsing plus [`FormContext`] reads and writes.
//! - **Registry**: fields keyed by path; several fields at one path form a
//!   group (checkbox groups, radio sets) ([`registry`], [`lifecycle`]).
//! - **Validation**: per-field [`FieldRules`] or a form-wide [`Schema`],
//!   scheduled with debounced batches and stale-result discard
//!   ([`scheduler`], [`token`]).
//! - **Meta**: touched, dirty, valid, pending at field and form level
//!   ([`meta`]).
//! - **Submission**: [`SubmitHandler`] gating a success callback on a force
//!   validation ([`submit`]).
//! - **Lists**: keyed array editing ([`field_array`]).
//!
//! # How it fits in the system
//! Writes are synchronous. Validation they trigger is queued and runs when
//! the host awaits [`FormContext::settle`], inside a Tokio runtime.
//!
//! ```ignore
//! let form = FormContext::new(FormConfig::default().with_initial_values(json!({"email": ""})));
//! let email = form.register_field(FieldOptions::new("email").with_rules(Rules::new().with(Email::new())));
//! email.handle_change(json!("nope"));
//! form.settle().await;
//! assert_eq!(email.error_message().as_deref(), Some("Invalid email address"));
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod error_bag;
pub mod field;
pub mod field_array;
pub mod form;
pub mod id;
pub mod initial;
pub mod lifecycle;
pub mod meta;
pub mod path;
pub mod registry;
pub mod rules;
pub mod scheduler;
pub mod schema;
pub mod submit;
pub mod token;

pub use binding::PathBinding;
pub use config::{DEFAULT_DEBOUNCE, FieldKind, FieldOptions, FormConfig};
pub use error::{FormError, FormResult};
pub use error_bag::ErrorBag;
pub use field::{Field, FieldResetState, FieldStatePatch};
pub use field_array::{FieldArray, FieldEntry};
pub use form::{FormContext, FormResetState};
pub use id::{FieldId, FormId, GroupId};
pub use initial::InitialValues;
pub use meta::{FieldMeta, FormMeta};
pub use scheduler::{FieldValidation, FormValidation, ValidationMode};
pub use schema::{
    FieldRules, RuleContext, RuleMap, Rules, Schema, SchemaResult, async_rule, rule_fn,
};
pub use submit::{
    InvalidSubmission, SubmissionActions, SubmitEvent, SubmitHandler, SubmitOutcome,
    SubmitTrigger,
};
pub use token::ValidationToken;
