//! Execution identifiers and the collaborator that mints them.
//!
//! Id generation is an injected collaborator rather than core engine logic —
//! this module only defines the trait the core depends on, plus one
//! unsurprising default so the crate is runnable without a caller having to
//! supply their own source on day one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque execution identifier, handed out by an [`IdSource`].
///
/// Two ids are equal iff they were minted for the same `create` call; callers
/// must not otherwise rely on their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecId(pub(crate) String);

impl fmt::Display for ExecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ExecId {
    /// Borrows the underlying opaque string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Produces unique execution identifiers.
///
/// Implementations only need to guarantee uniqueness across the lifetime of
/// a single template's history; they are never compared across templates.
pub trait IdSource: Send + Sync {
    /// Mints a fresh, previously-unused [`ExecId`].
    fn next_id(&self) -> ExecId;
}

/// A monotonic counter-backed [`IdSource`].
///
/// This is the default a [`crate::TemplateBuilder`] uses when the caller
/// never calls `id_source`; it is adequate for a single process and for
/// tests, which is the entirety of what this crate promises about id
/// generation.
#[derive(Debug, Default)]
pub struct AtomicIdSource {
    next: AtomicU64,
}

impl AtomicIdSource {
    /// Creates a fresh counter starting at zero.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }
}

impl IdSource for AtomicIdSource {
    fn next_id(&self) -> ExecId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ExecId(format!("exec-{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ordered() {
        let source = AtomicIdSource::new();
        let a = source.next_id();
        let b = source.next_id();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "exec-0");
        assert_eq!(b.as_str(), "exec-1");
    }
}
