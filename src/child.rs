//! The argument type accepted by [`crate::handle::Handle::add_child`].
//!
//! The loosely-typed original accepts either a single handle or an array of
//! handles and dispatches on `typeof`/`Array.isArray`, falling back to
//! `BadInput` for anything else. A statically typed `addChild` can rule out
//! the "anything else" case at compile time; what remains is exactly the
//! single-vs-collection distinction, modeled directly as an enum.

use crate::handle::Handle;

/// What a caller may pass to `add_child`.
pub enum ChildArg<P, V, E> {
    /// A single subtree to attach.
    Single(Handle<P, V, E>),
    /// A collection of subtrees, collapsed into a chain or wrapped in a
    /// parallel composite depending on the `no_parallel` flag passed
    /// alongside it.
    Many(Vec<Handle<P, V, E>>),
}

impl<P, V, E> ChildArg<P, V, E> {
    /// A collection with no elements has nothing to become `finalChild` or to
    /// wrap in a composite; callers must reject it as malformed input rather
    /// than silently producing a no-op subtree.
    pub fn is_empty_collection(&self) -> bool {
        matches!(self, ChildArg::Many(v) if v.is_empty())
    }
}

impl<P, V, E> From<Handle<P, V, E>> for ChildArg<P, V, E> {
    fn from(h: Handle<P, V, E>) -> Self {
        ChildArg::Single(h)
    }
}

impl<P, V, E> From<Vec<Handle<P, V, E>>> for ChildArg<P, V, E> {
    fn from(v: Vec<Handle<P, V, E>>) -> Self {
        ChildArg::Many(v)
    }
}
