#![forbid(unsafe_code)]

//! Monotonic validation tokens.
//!
//! Every validation a field starts takes a fresh token from its gate. When
//! the async result comes back it is applied only if its token is still the
//! gate's current one; results of superseded runs are discarded.
//!
//! # Invariants
//!
//! - Tokens from one gate are strictly increasing.
//! - Token 0 is reserved for "no validation started".
//! - A stale token is never accepted again once a newer token was issued.

use std::cell::Cell;
use std::fmt;

/// Identifier of one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidationToken(u64);

impl ValidationToken {
    /// The "no validation" token.
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for ValidationToken {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ValidationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

/// Issues tokens and remembers the latest one.
#[derive(Debug, Default)]
pub struct TokenGate {
    current: Cell<ValidationToken>,
}

impl TokenGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run; supersedes every earlier token.
    pub fn start(&self) -> ValidationToken {
        let token = ValidationToken(self.current.get().0 + 1);
        self.current.set(token);
        token
    }

    #[must_use]
    pub fn current(&self) -> ValidationToken {
        self.current.get()
    }

    /// Whether a run holding `token` may still apply its result.
    #[must_use]
    pub fn is_current(&self, token: ValidationToken) -> bool {
        !token.is_none() && self.current.get() == token
    }
}
