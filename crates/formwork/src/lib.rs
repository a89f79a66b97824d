#![forbid(unsafe_code)]

//! Formwork public facade crate.
//!
//! Re-exports the form engine and its reactive building blocks, plus a
//! prelude for day-to-day usage.

// --- Form re-exports -------------------------------------------------------

pub use formwork_core::{
    DEFAULT_DEBOUNCE, ErrorBag, Field, FieldArray, FieldEntry, FieldKind, FieldMeta, FieldOptions,
    FieldResetState, FieldRules, FieldStatePatch, FieldValidation, FormConfig, FormContext,
    FormMeta, FormResetState, FormValidation, InitialValues, InvalidSubmission, PathBinding,
    RuleContext, RuleMap, Rules, Schema, SchemaResult, SubmissionActions, SubmitEvent,
    SubmitHandler, SubmitOutcome, SubmitTrigger, ValidationMode, async_rule, rule_fn,
};

// --- Validator re-exports --------------------------------------------------

pub use formwork_core::rules::{
    Accepted, Email, MaxLength, MinLength, OneOf, Pattern, Range, Required, Validator,
    ValidatorBuilder,
};

// --- Value re-exports ------------------------------------------------------

pub use serde_json::{Value, json};

// --- Errors ---------------------------------------------------------------

pub use formwork_core::FormError as Error;

/// Standard result type for formwork APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, Field, FieldOptions, FormConfig, FormContext, Result, RuleMap, Rules,
        SubmitOutcome, SubmitTrigger, ValidationMode, Value, json,
    };

    pub use crate::{core, reactive};
}

pub use formwork_core as core;
pub use formwork_reactive as reactive;
