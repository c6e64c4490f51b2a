//! The lifecycle hook catalog and dispatch.
//!
//! Rather than a record with one named optional field per hook point (20-odd
//! fields, almost all `None` on any given template), hooks are keyed by a
//! [`HookKind`] tagged variant and dispatched through a single lookup, so
//! adding a hook point never means adding a field everywhere one is matched.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::ContextSnapshot;
use crate::handle::Handle;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Every argument a hook closure receives.
pub struct HookArgs<P, V, E> {
    /// The owning execution's parameters.
    pub params: P,
    /// A cheap, owned peek at the owning context's flags and identity.
    pub context: ContextSnapshot,
    /// A handle back to the owning execution, usable to graft new children.
    pub handle: Handle<P, V, E>,
}

/// A hook closure: takes the usual `(params, ctx, handle)` triple and may
/// return a value that gets appended to the walk's result sequence.
pub type HookFn<P, V, E> =
    dyn Fn(HookArgs<P, V, E>) -> BoxFuture<'static, Result<Option<V>, E>> + Send + Sync;

/// Which walk a hook specialization fires during.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Specialization {
    /// Fires on both the exec walk and the undo walk.
    Both,
    /// Fires only while executing.
    ExecOnly,
    /// Fires only while undoing.
    UndoOnly,
}

/// Which slot and position a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Before the before-child runs.
    PreBefore,
    /// After the before-child finishes.
    PostBefore,
    /// Before the retry loop around the user action starts.
    PreDuring,
    /// Before each individual attempt in the retry loop.
    PreDuringTry,
    /// After each individual attempt in the retry loop, including the last.
    PostDuringTry,
    /// After the retry loop finishes.
    PostDuring,
    /// Before the after-child runs.
    PreAfter,
    /// After the after-child finishes.
    PostAfter,
}

/// One of the named hook slots a template may populate.
///
/// `(point, specialization)` pairs that the phase sequence never actually
/// visits (e.g. a `PreBeforeTry` of any kind, since there is no retry loop
/// around the before-child) are simply never constructed or looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookKind(pub HookPoint, pub Specialization);

impl HookKind {
    /// Builds a kind from its point and walk specialization.
    pub const fn new(point: HookPoint, specialization: Specialization) -> Self {
        HookKind(point, specialization)
    }
}

/// The full set of hooks a template was built with.
pub struct Hooks<P, V, E> {
    slots: HashMap<HookKind, Arc<HookFn<P, V, E>>>,
}

impl<P, V, E> Default for Hooks<P, V, E> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<P, V, E> Hooks<P, V, E> {
    /// An empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` at `kind`, replacing any hook already there.
    pub fn set<F>(&mut self, kind: HookKind, f: F)
    where
        F: Fn(HookArgs<P, V, E>) -> BoxFuture<'static, Result<Option<V>, E>> + Send + Sync + 'static,
    {
        self.slots.insert(kind, Arc::new(f));
    }

    /// Looks up the hook at `kind`, if the template defined one.
    pub fn get(&self, kind: HookKind) -> Option<Arc<HookFn<P, V, E>>> {
        self.slots.get(&kind).cloned()
    }

    /// Whether no hooks at all were registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Convenience constructors for the full set of `(point, Both | ExecOnly |
/// UndoOnly)` kinds referenced by the executor and undoer, named the way the
/// phase sequence names them.
pub mod kind {
    use super::{HookKind, HookPoint::*, Specialization::*};

    /// Before the before-child runs, on either walk.
    pub const PRE_BEFORE: HookKind = HookKind::new(PreBefore, Both);
    /// Before the before-child runs, exec walk only.
    pub const PRE_BEFORE_EXEC_ONLY: HookKind = HookKind::new(PreBefore, ExecOnly);
    /// Before the before-child runs, undo walk only.
    pub const PRE_BEFORE_UNDO_ONLY: HookKind = HookKind::new(PreBefore, UndoOnly);

    /// After the before-child finishes, on either walk.
    pub const POST_BEFORE: HookKind = HookKind::new(PostBefore, Both);
    /// After the before-child finishes, exec walk only.
    pub const POST_BEFORE_EXEC_ONLY: HookKind = HookKind::new(PostBefore, ExecOnly);
    /// After the before-child finishes, undo walk only.
    pub const POST_BEFORE_UNDO_ONLY: HookKind = HookKind::new(PostBefore, UndoOnly);

    /// Before the retry loop starts, on either walk.
    pub const PRE_DURING: HookKind = HookKind::new(PreDuring, Both);
    /// Before the retry loop starts, exec walk only.
    pub const PRE_DURING_EXEC_ONLY: HookKind = HookKind::new(PreDuring, ExecOnly);
    /// Before the retry loop starts, undo walk only.
    pub const PRE_DURING_UNDO_ONLY: HookKind = HookKind::new(PreDuring, UndoOnly);

    /// Before each retry attempt, on either walk.
    pub const PRE_DURING_TRY: HookKind = HookKind::new(PreDuringTry, Both);
    /// Before each retry attempt, exec walk only.
    pub const PRE_DURING_TRY_EXEC_ONLY: HookKind = HookKind::new(PreDuringTry, ExecOnly);
    /// Before each retry attempt, undo walk only.
    pub const PRE_DURING_TRY_UNDO_ONLY: HookKind = HookKind::new(PreDuringTry, UndoOnly);

    /// After each retry attempt (including the last, successful one), on
    /// either walk.
    pub const POST_DURING_TRY: HookKind = HookKind::new(PostDuringTry, Both);
    /// After each retry attempt, exec walk only.
    pub const POST_DURING_TRY_EXEC_ONLY: HookKind = HookKind::new(PostDuringTry, ExecOnly);
    /// After each retry attempt, undo walk only.
    pub const POST_DURING_TRY_UNDO_ONLY: HookKind = HookKind::new(PostDuringTry, UndoOnly);

    /// After the retry loop finishes, on either walk.
    pub const POST_DURING: HookKind = HookKind::new(PostDuring, Both);
    /// After the retry loop finishes, exec walk only.
    pub const POST_DURING_EXEC_ONLY: HookKind = HookKind::new(PostDuring, ExecOnly);
    /// After the retry loop finishes, undo walk only.
    pub const POST_DURING_UNDO_ONLY: HookKind = HookKind::new(PostDuring, UndoOnly);

    /// Before the after-child runs, on either walk.
    pub const PRE_AFTER: HookKind = HookKind::new(PreAfter, Both);
    /// Before the after-child runs, exec walk only.
    pub const PRE_AFTER_EXEC_ONLY: HookKind = HookKind::new(PreAfter, ExecOnly);
    /// Before the after-child runs, undo walk only.
    pub const PRE_AFTER_UNDO_ONLY: HookKind = HookKind::new(PreAfter, UndoOnly);

    /// After the after-child finishes, on either walk.
    pub const POST_AFTER: HookKind = HookKind::new(PostAfter, Both);
    /// After the after-child finishes, exec walk only.
    pub const POST_AFTER_EXEC_ONLY: HookKind = HookKind::new(PostAfter, ExecOnly);
    /// After the after-child finishes, undo walk only.
    pub const POST_AFTER_UNDO_ONLY: HookKind = HookKind::new(PostAfter, UndoOnly);
}
