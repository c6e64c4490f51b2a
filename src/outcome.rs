//! The heterogeneous result sequence accumulated across one walk.
//!
//! Each step can either return a value or raise an error, recorded in the
//! order things happened; a tagged variant is the idiomatic Rust shape for
//! that instead of a loosely-typed array.

/// One entry of an `exec_results`/`undo_results` sequence: either a value a
/// user action or hook returned, or an error one of them raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V, E> {
    /// A successful return value from a user action or hook.
    Value(V),
    /// An error raised by a user action, hook, or child subtree.
    Failure(E),
}

impl<V, E> Outcome<V, E> {
    /// True if this entry represents success.
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// True if this entry represents a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Borrows the value, if this is a [`Outcome::Value`].
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Failure(_) => None,
        }
    }

    /// Borrows the error, if this is a [`Outcome::Failure`].
    pub fn as_failure(&self) -> Option<&E> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Failure(e) => Some(e),
        }
    }
}
