#![forbid(unsafe_code)]

//! Synchronous value rules.
//!
//! A [`Validator`] checks one [`Value`] and reports at most one
//! [`ValidationError`]. Validators compose with [`And`], [`Or`], [`Not`],
//! [`All`] and [`Any`], or fluently through [`ValidatorBuilder`]. To attach
//! them to a field or a rule map, collect them into a
//! [`Rules`](crate::schema::Rules) list.
//!
//! Format rules ([`MinLength`], [`Pattern`], [`Email`], ...) treat an empty
//! value as valid; pair them with [`Required`] when the field is mandatory.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Error Codes
// ---------------------------------------------------------------------------

/// Error code for required values.
pub const ERROR_CODE_REQUIRED: &str = "required";
/// Error code for minimum length.
pub const ERROR_CODE_MIN_LENGTH: &str = "too_short";
/// Error code for maximum length.
pub const ERROR_CODE_MAX_LENGTH: &str = "too_long";
/// Error code for pattern mismatch.
pub const ERROR_CODE_PATTERN: &str = "pattern";
/// Error code for email addresses.
pub const ERROR_CODE_EMAIL: &str = "email";
/// Error code for numeric ranges.
pub const ERROR_CODE_RANGE: &str = "range";
/// Error code for acceptance checkboxes.
pub const ERROR_CODE_ACCEPTED: &str = "accepted";
/// Error code for enumerations.
pub const ERROR_CODE_ONE_OF: &str = "one_of";

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A rule failure with a stable code and an interpolated message.
///
/// `{key}` placeholders in `message` are replaced by `params[key]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
    pub params: HashMap<String, String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Add a parameter unless one with the same key exists.
    #[must_use]
    pub fn with_default_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params
            .entry(key.into())
            .or_insert_with(|| value.to_string());
        self
    }

    /// The message with every `{key}` replaced.
    #[must_use]
    pub fn format_message(&self) -> String {
        let mut result = self.message.clone();
        for (key, value) in &self.params {
            result = result.replace(&format!("{{{key}}}"), value);
        }
        result
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_message())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    #[default]
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ValidationError::format_message)
    }

    /// First error wins.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::Valid => other,
            Self::Invalid(_) => self,
        }
    }

    /// Valid if either side is.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Valid => Self::Valid,
            Self::Invalid(_) => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Validator Trait
// ---------------------------------------------------------------------------

/// A synchronous check over one form value.
pub trait Validator {
    fn validate(&self, value: &Value) -> ValidationResult;

    /// Default message template for this rule.
    fn error_message(&self) -> &str;
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn validate(&self, value: &Value) -> ValidationResult {
        (**self).validate(value)
    }

    fn error_message(&self) -> &str {
        (**self).error_message()
    }
}

/// Whether a value counts as "not provided": null, an empty or
/// whitespace-only string, or an empty array.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Character count for strings, item count for arrays.
fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn fail(code: &'static str, message: &str) -> ValidationResult {
    ValidationResult::Invalid(ValidationError::new(code, message))
}

// ---------------------------------------------------------------------------
// Built-in Validators
// ---------------------------------------------------------------------------

/// The value must be provided. `false` and `0` count as provided.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required {
    pub allow_whitespace: bool,
}

impl Required {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allow_whitespace(mut self) -> Self {
        self.allow_whitespace = true;
        self
    }
}

impl Validator for Required {
    fn validate(&self, value: &Value) -> ValidationResult {
        let empty = match value {
            Value::String(s) if self.allow_whitespace => s.is_empty(),
            other => is_empty_value(other),
        };
        if empty {
            fail(ERROR_CODE_REQUIRED, self.error_message())
        } else {
            ValidationResult::Valid
        }
    }

    fn error_message(&self) -> &str {
        "This field is required"
    }
}

/// Strings need at least `min` characters, arrays at least `min` items.
#[derive(Debug, Clone, Copy)]
pub struct MinLength {
    pub min: usize,
}

impl MinLength {
    #[must_use]
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl Validator for MinLength {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_value(value) {
            return ValidationResult::Valid;
        }
        match value_len(value) {
            Some(len) if len < self.min => ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_MIN_LENGTH, self.error_message())
                    .with_param("min", self.min)
                    .with_param("actual", len),
            ),
            _ => ValidationResult::Valid,
        }
    }

    fn error_message(&self) -> &str {
        "Must be at least {min} characters"
    }
}

/// Strings may have at most `max` characters, arrays at most `max` items.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength {
    pub max: usize,
}

impl MaxLength {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Validator for MaxLength {
    fn validate(&self, value: &Value) -> ValidationResult {
        match value_len(value) {
            Some(len) if len > self.max => ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_MAX_LENGTH, self.error_message())
                    .with_param("max", self.max)
                    .with_param("actual", len),
            ),
            _ => ValidationResult::Valid,
        }
    }

    fn error_message(&self) -> &str {
        "Must be at most {max} characters"
    }
}

/// Substring or exact-match check on string values.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub pattern: String,
    pub message: String,
    pub exact: bool,
}

impl Pattern {
    #[must_use]
    pub fn contains(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            message: "Invalid format".to_string(),
            exact: false,
        }
    }

    #[must_use]
    pub fn exact(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            message: "Invalid format".to_string(),
            exact: true,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Validator for Pattern {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_value(value) {
            return ValidationResult::Valid;
        }
        let Value::String(s) = value else {
            return fail(ERROR_CODE_PATTERN, &self.message);
        };
        let matches = if self.exact {
            *s == self.pattern
        } else {
            s.contains(&self.pattern)
        };
        if matches {
            ValidationResult::Valid
        } else {
            fail(ERROR_CODE_PATTERN, &self.message)
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

/// Heuristic email check: `local@domain.tld` with a TLD of two or more
/// characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Email;

impl Email {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn looks_valid(address: &str) -> bool {
        let Some((local, domain)) = address.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return false;
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.iter().any(|l| l.is_empty()) {
            return false;
        }
        labels.last().is_some_and(|tld| tld.len() >= 2)
    }
}

impl Validator for Email {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_value(value) {
            return ValidationResult::Valid;
        }
        match value {
            Value::String(s) if Self::looks_valid(s.trim()) => ValidationResult::Valid,
            _ => fail(ERROR_CODE_EMAIL, self.error_message()),
        }
    }

    fn error_message(&self) -> &str {
        "Invalid email address"
    }
}

/// Inclusive numeric range. Numeric strings are parsed.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Validator for Range {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_value(value) {
            return ValidationResult::Valid;
        }
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(n) if n >= self.min && n <= self.max => ValidationResult::Valid,
            other => {
                let mut err = ValidationError::new(ERROR_CODE_RANGE, self.error_message())
                    .with_param("min", self.min)
                    .with_param("max", self.max);
                if let Some(n) = other {
                    err = err.with_param("actual", n);
                }
                ValidationResult::Invalid(err)
            }
        }
    }

    fn error_message(&self) -> &str {
        "Must be between {min} and {max}"
    }
}

/// The value must be an affirmative answer: `true`, `1`, `"true"`,
/// `"yes"` or `"on"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accepted;

impl Accepted {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for Accepted {
    fn validate(&self, value: &Value) -> ValidationResult {
        let accepted = match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => matches!(s.as_str(), "true" | "yes" | "on" | "1"),
            _ => false,
        };
        if accepted {
            ValidationResult::Valid
        } else {
            fail(ERROR_CODE_ACCEPTED, self.error_message())
        }
    }

    fn error_message(&self) -> &str {
        "This field must be accepted"
    }
}

/// The value must equal one of `options`. Arrays must contain only options.
#[derive(Debug, Clone, Default)]
pub struct OneOf {
    pub options: Vec<Value>,
}

impl OneOf {
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = Value>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }
}

impl Validator for OneOf {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_value(value) {
            return ValidationResult::Valid;
        }
        let ok = match value {
            Value::Array(items) => items.iter().all(|item| self.options.contains(item)),
            other => self.options.contains(other),
        };
        if ok {
            ValidationResult::Valid
        } else {
            fail(ERROR_CODE_ONE_OF, self.error_message())
        }
    }

    fn error_message(&self) -> &str {
        "Not an allowed value"
    }
}

// ---------------------------------------------------------------------------
// Composition Validators
// ---------------------------------------------------------------------------

/// Both must pass; the first failure is reported.
#[derive(Debug, Clone)]
pub struct And<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> And<A, B> {
    #[must_use]
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Validator, B: Validator> Validator for And<A, B> {
    fn validate(&self, value: &Value) -> ValidationResult {
        self.first.validate(value).and(self.second.validate(value))
    }

    fn error_message(&self) -> &str {
        self.first.error_message()
    }
}

/// Either may pass; if both fail, the second failure is reported.
#[derive(Debug, Clone)]
pub struct Or<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Or<A, B> {
    #[must_use]
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Validator, B: Validator> Validator for Or<A, B> {
    fn validate(&self, value: &Value) -> ValidationResult {
        match self.first.validate(value) {
            ValidationResult::Valid => ValidationResult::Valid,
            ValidationResult::Invalid(_) => self.second.validate(value),
        }
    }

    fn error_message(&self) -> &str {
        self.second.error_message()
    }
}

/// Inverts `inner`.
#[derive(Debug, Clone)]
pub struct Not<V> {
    pub inner: V,
    pub message: String,
}

impl<V> Not<V> {
    #[must_use]
    pub fn new(inner: V, message: impl Into<String>) -> Self {
        Self {
            inner,
            message: message.into(),
        }
    }
}

impl<V: Validator> Validator for Not<V> {
    fn validate(&self, value: &Value) -> ValidationResult {
        match self.inner.validate(value) {
            ValidationResult::Valid => fail("not", &self.message),
            ValidationResult::Invalid(_) => ValidationResult::Valid,
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

/// Every validator must pass; stops at the first failure.
#[derive(Default)]
pub struct All {
    validators: Vec<Box<dyn Validator>>,
}

impl All {
    #[must_use]
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }
}

impl Validator for All {
    fn validate(&self, value: &Value) -> ValidationResult {
        self.validators
            .iter()
            .map(|v| v.validate(value))
            .find(ValidationResult::is_invalid)
            .unwrap_or_default()
    }

    fn error_message(&self) -> &str {
        self.validators
            .first()
            .map_or("Validation failed", |v| v.error_message())
    }
}

impl fmt::Debug for All {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("All")
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// At least one validator must pass; reports the last failure otherwise.
#[derive(Default)]
pub struct Any {
    validators: Vec<Box<dyn Validator>>,
}

impl Any {
    #[must_use]
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }
}

impl Validator for Any {
    fn validate(&self, value: &Value) -> ValidationResult {
        let mut last_error = None;
        for validator in &self.validators {
            match validator.validate(value) {
                ValidationResult::Valid => return ValidationResult::Valid,
                ValidationResult::Invalid(e) => last_error = Some(e),
            }
        }
        last_error.map_or(ValidationResult::Valid, ValidationResult::Invalid)
    }

    fn error_message(&self) -> &str {
        self.validators
            .last()
            .map_or("Validation failed", |v| v.error_message())
    }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Any")
            .field("validators", &self.validators.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ValidatorBuilder
// ---------------------------------------------------------------------------

/// Fluent construction of an [`All`] chain.
///
/// ```
/// use formwork_core::rules::{Validator, ValidatorBuilder};
/// use serde_json::json;
///
/// let username = ValidatorBuilder::new().required().min_length(3).build();
/// assert!(username.validate(&json!("alice")).is_valid());
/// assert!(username.validate(&json!("al")).is_invalid());
/// ```
#[derive(Default)]
pub struct ValidatorBuilder {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn custom(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    #[must_use]
    pub fn required(self) -> Self {
        self.custom(Required::new())
    }

    #[must_use]
    pub fn min_length(self, min: usize) -> Self {
        self.custom(MinLength::new(min))
    }

    #[must_use]
    pub fn max_length(self, max: usize) -> Self {
        self.custom(MaxLength::new(max))
    }

    #[must_use]
    pub fn email(self) -> Self {
        self.custom(Email::new())
    }

    #[must_use]
    pub fn range(self, min: f64, max: f64) -> Self {
        self.custom(Range::new(min, max))
    }

    #[must_use]
    pub fn accepted(self) -> Self {
        self.custom(Accepted::new())
    }

    #[must_use]
    pub fn one_of(self, options: impl IntoIterator<Item = Value>) -> Self {
        self.custom(OneOf::new(options))
    }

    #[must_use]
    pub fn build(self) -> All {
        All::new(self.validators)
    }
}

impl fmt::Debug for ValidatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorBuilder")
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- ValidationError --

    #[test]
    fn format_message_interpolates_params() {
        let err = ValidationError::new(ERROR_CODE_MIN_LENGTH, "{field} needs {min} characters")
            .with_param("min", 8)
            .with_default_param("field", "Password")
            .with_default_param("min", 99);
        assert_eq!(err.format_message(), "Password needs 8 characters");
        assert_eq!(err.to_string(), "Password needs 8 characters");
    }

    // -- Built-ins --

    #[test]
    fn required_rejects_empty_shapes() {
        let v = Required::new();
        assert!(v.validate(&Value::Null).is_invalid());
        assert!(v.validate(&json!("  ")).is_invalid());
        assert!(v.validate(&json!([])).is_invalid());
        assert!(v.validate(&json!(false)).is_valid());
        assert!(v.validate(&json!(0)).is_valid());
        assert!(v.validate(&json!("x")).is_valid());
        assert!(Required::new().allow_whitespace().validate(&json!(" ")).is_valid());
    }

    #[test]
    fn min_length_counts_chars_and_items() {
        let v = MinLength::new(3);
        assert!(v.validate(&json!("ab")).is_invalid());
        assert!(v.validate(&json!("héé")).is_valid());
        assert!(v.validate(&json!([1, 2])).is_invalid());
        assert!(v.validate(&json!("")).is_valid());
        assert_eq!(
            v.validate(&json!("ab")).error_message().as_deref(),
            Some("Must be at least 3 characters")
        );
    }

    #[test]
    fn max_length() {
        let v = MaxLength::new(2);
        assert!(v.validate(&json!("abc")).is_invalid());
        assert!(v.validate(&json!(["a", "b"])).is_valid());
    }

    #[test]
    fn pattern_contains_and_exact() {
        assert!(Pattern::contains("@").validate(&json!("a@b")).is_valid());
        assert!(Pattern::contains("@").validate(&json!("ab")).is_invalid());
        let exact = Pattern::exact("yes").with_message("Type yes");
        assert_eq!(
            exact.validate(&json!("no")).error_message().as_deref(),
            Some("Type yes")
        );
        assert!(exact.validate(&json!(4)).is_invalid());
    }

    #[test]
    fn email_heuristics() {
        let v = Email::new();
        assert!(v.validate(&json!("a@b.com")).is_valid());
        assert!(v.validate(&json!("")).is_valid());
        assert!(v.validate(&json!("a@b")).is_invalid());
        assert!(v.validate(&json!("a@b.c")).is_invalid());
        assert!(v.validate(&json!("@b.com")).is_invalid());
        assert!(v.validate(&json!("a@b..com")).is_invalid());
    }

    #[test]
    fn range_accepts_numbers_and_numeric_strings() {
        let v = Range::new(1.0, 10.0);
        assert!(v.validate(&json!(5)).is_valid());
        assert!(v.validate(&json!("7.5")).is_valid());
        assert!(v.validate(&json!(11)).is_invalid());
        assert!(v.validate(&json!("abc")).is_invalid());
        assert_eq!(
            v.validate(&json!(0)).error_message().as_deref(),
            Some("Must be between 1 and 10")
        );
    }

    #[test]
    fn accepted_requires_affirmative() {
        let v = Accepted::new();
        assert!(v.validate(&json!(true)).is_valid());
        assert!(v.validate(&json!("on")).is_valid());
        assert!(v.validate(&json!(false)).is_invalid());
        assert!(v.validate(&Value::Null).is_invalid());
    }

    #[test]
    fn one_of_checks_scalars_and_arrays() {
        let v = OneOf::new([json!("red"), json!("blue")]);
        assert!(v.validate(&json!("red")).is_valid());
        assert!(v.validate(&json!(["red", "blue"])).is_valid());
        assert!(v.validate(&json!(["red", "green"])).is_invalid());
        assert!(v.validate(&json!("green")).is_invalid());
    }

    // -- Composition --

    #[test]
    fn and_or_not() {
        let both = And::new(Required::new(), MinLength::new(2));
        assert_eq!(
            both.validate(&json!("")).error().map(|e| e.code),
            Some(ERROR_CODE_REQUIRED)
        );
        assert_eq!(
            both.validate(&json!("a")).error().map(|e| e.code),
            Some(ERROR_CODE_MIN_LENGTH)
        );

        let either = Or::new(Pattern::exact("a"), Pattern::exact("b"));
        assert!(either.validate(&json!("b")).is_valid());
        assert!(either.validate(&json!("c")).is_invalid());

        let not = Not::new(Pattern::contains(" "), "No spaces");
        assert!(not.validate(&json!("a b")).is_invalid());
        assert!(not.validate(&json!("ab")).is_valid());
    }

    #[test]
    fn any_reports_last_failure() {
        let any = Any::new(vec![Box::new(Pattern::exact("x")), Box::new(Email::new())]);
        assert!(any.validate(&json!("x")).is_valid());
        assert_eq!(
            any.validate(&json!("y")).error().map(|e| e.code),
            Some(ERROR_CODE_EMAIL)
        );
        assert!(Any::default().validate(&json!(1)).is_valid());
    }

    #[test]
    fn builder_chains_in_order() {
        let v = ValidatorBuilder::new().required().email().build();
        assert_eq!(
            v.validate(&json!("")).error().map(|e| e.code),
            Some(ERROR_CODE_REQUIRED)
        );
        assert_eq!(
            v.validate(&json!("nope")).error().map(|e| e.code),
            Some(ERROR_CODE_EMAIL)
        );
        assert!(v.validate(&json!("a@b.io")).is_valid());
        assert_eq!(v.error_message(), "This field is required");
    }
}
