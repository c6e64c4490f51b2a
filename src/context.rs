//! The mutable, per-execution state a [`crate::handle::Handle`] is a view onto.

use std::time::Duration;

use crate::during::DuringChildren;
use crate::handle::{Handle, WeakHandle};
use crate::id::ExecId;
use crate::outcome::Outcome;
use crate::phases::Phases;

/// One execution's mutable record, keyed by its [`ExecId`] in a template's
/// history. A handle exclusively owns its context's fields; `before_child`
/// and `after_child` shared-own their targets, since ownership of a subtree
/// follows whichever slot currently lists it, not the `parent` back-edge.
pub struct Context<P, V, E> {
    /// This execution's identity within the owning template's history.
    pub exec_id: ExecId,
    /// The parameters this execution was created with.
    pub params: P,

    /// The handle that runs immediately before this context's own action.
    pub before_child: Option<Handle<P, V, E>>,
    /// The handle that runs immediately after this context's own action.
    pub after_child: Option<Handle<P, V, E>>,
    /// Back-reference to whoever grafted this context as a during-child.
    pub parent: Option<WeakHandle<P, V, E>>,

    /// Children grafted mid-walk, bucketed by which slot was executing.
    pub during_children: DuringChildren<P, V, E>,
    /// A child staged by `add_child` while this context is mid-walk, waiting
    /// to be executed and filed into `during_children`.
    pub pending_during_child: Option<Handle<P, V, E>>,

    /// `Some` only for the parallel composite's own context: the children to
    /// fan out over. The composite is not ternary itself, so its presence
    /// short-circuits the normal before/self/after phase sequence entirely
    /// (see `executor::run_parallel`/`undoer::run_parallel_undo`).
    pub parallel_children: Option<Vec<Handle<P, V, E>>>,

    /// Which steps of the walk have run, and with what result.
    pub phases: Phases,

    /// Outcomes accumulated over the course of an `exec` walk.
    pub exec_results: Vec<Outcome<V, E>>,
    /// Outcomes accumulated over the course of an `undo` walk.
    pub undo_results: Vec<Outcome<V, E>>,
    /// Outcomes from the current retry loop's attempts, folded into
    /// `exec_results` once the loop exits.
    pub op_results: Vec<Outcome<V, E>>,
    /// Outcomes from the current undo retry loop's attempts, folded into
    /// `undo_results` once the loop exits.
    pub op_undo_results: Vec<Outcome<V, E>>,

    /// Set for the duration of an `exec` walk through this context.
    pub executing: bool,
    /// Set for the duration of an `undo` walk through this context.
    pub undoing: bool,

    /// Retry budget for the current `exec`/`undo` call.
    pub num_tries: u32,
    /// Pause between retry attempts for the current `exec`/`undo` call.
    pub retry_interval: Duration,
}

impl<P, V, E> Context<P, V, E> {
    /// A fresh, idle context: no children, no phases run, no results yet.
    pub fn new(exec_id: ExecId, params: P, num_tries: u32, retry_interval: Duration) -> Self {
        Self {
            exec_id,
            params,
            before_child: None,
            after_child: None,
            parent: None,
            during_children: DuringChildren::default(),
            pending_during_child: None,
            parallel_children: None,
            phases: Phases::new(),
            exec_results: Vec::new(),
            undo_results: Vec::new(),
            op_results: Vec::new(),
            op_undo_results: Vec::new(),
            executing: false,
            undoing: false,
            num_tries,
            retry_interval,
        }
    }

    /// A cheap, owned peek at this context's flags and identity, handed to
    /// user exec/undo/hook closures instead of a live lock guard so they can
    /// reentrantly call back into the handle (e.g. `add_child`) without
    /// deadlocking on the lock the executor is currently holding.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            exec_id: self.exec_id.clone(),
            phases: self.phases,
            executing: self.executing,
            undoing: self.undoing,
            num_tries: self.num_tries,
            retry_interval: self.retry_interval,
        }
    }

    /// Applies the per-attempt invariant: every attempt to run the user
    /// `exec` increments `exec_function_attempt`.
    pub fn begin_exec_attempt(&mut self, attempt: u32) {
        self.phases.exec_function_attempt = attempt;
        self.during_children.during_slot.clear();
    }

    /// Clears phase flags and every result buffer, keeping `params`,
    /// `before_child`, and `after_child` intact. Does not recurse into
    /// children; callers walk the tree themselves (see `Handle::reset`).
    pub fn reset_self(&mut self) {
        self.phases = Phases::new();
        self.exec_results.clear();
        self.undo_results.clear();
        self.op_results.clear();
        self.op_undo_results.clear();
        self.during_children.before_slot.clear();
        self.during_children.during_slot.clear();
        self.during_children.after_slot.clear();
        self.pending_during_child = None;
        self.executing = false;
        self.undoing = false;
    }
}

/// An owned snapshot of a context's identity and flags at one instant.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    /// The execution's identity at the time of the snapshot.
    pub exec_id: ExecId,
    /// Which steps of the walk had run, and with what result.
    pub phases: Phases,
    /// Whether an `exec` walk was in progress.
    pub executing: bool,
    /// Whether an `undo` walk was in progress.
    pub undoing: bool,
    /// The retry budget in effect.
    pub num_tries: u32,
    /// The retry pause in effect.
    pub retry_interval: Duration,
}
