//! Storage for children grafted dynamically while a node is executing.
//!
//! A grafted child runs to completion immediately, at the moment it is
//! attached, rather than being woven into the surrounding before/after tree
//! and walked later. So undo only ever needs one thing from this bucket:
//! replay the grafted children in reverse order of attachment. A pair of
//! stacks (one per attachment position) gives exactly that ordering; see
//! DESIGN.md for why that's simpler than reusing the ternary rotation/chain
//! machinery `add_child` uses for the real tree.

use crate::handle::Handle;

/// The grafts recorded for one during-slot, split by attachment position.
#[derive(Debug)]
pub struct DuringSlot<P, V, E> {
    before_position: Vec<Handle<P, V, E>>,
    after_position: Vec<Handle<P, V, E>>,
}

impl<P, V, E> Default for DuringSlot<P, V, E> {
    fn default() -> Self {
        Self {
            before_position: Vec::new(),
            after_position: Vec::new(),
        }
    }
}

impl<P, V, E> DuringSlot<P, V, E> {
    /// Records a newly grafted child at the given attachment position.
    pub fn push(&mut self, child: Handle<P, V, E>, before_position: bool) {
        if before_position {
            self.before_position.push(child);
        } else {
            self.after_position.push(child);
        }
    }

    /// Drops every recorded graft, e.g. between retry attempts.
    pub fn clear(&mut self) {
        self.before_position.clear();
        self.after_position.clear();
    }

    /// Grafts attached in "before" position, most-recently-attached first.
    pub fn before_position_reversed(&self) -> impl Iterator<Item = &Handle<P, V, E>> {
        self.before_position.iter().rev()
    }

    /// Grafts attached in "after" position, most-recently-attached first.
    pub fn after_position_reversed(&self) -> impl Iterator<Item = &Handle<P, V, E>> {
        self.after_position.iter().rev()
    }
}

/// The three per-phase graft buckets a context maintains: `before_slot` for
/// grafts recorded while the before-child was still running, `during_slot`
/// for grafts recorded around the user action's retry loop, `after_slot` for
/// grafts recorded while the after-child was running.
#[derive(Debug)]
pub struct DuringChildren<P, V, E> {
    /// Grafts recorded while the before-child was running.
    pub before_slot: DuringSlot<P, V, E>,
    /// Grafts recorded around the user action's retry loop.
    pub during_slot: DuringSlot<P, V, E>,
    /// Grafts recorded while the after-child was running.
    pub after_slot: DuringSlot<P, V, E>,
}

impl<P, V, E> Default for DuringChildren<P, V, E> {
    fn default() -> Self {
        Self {
            before_slot: DuringSlot::default(),
            during_slot: DuringSlot::default(),
            after_slot: DuringSlot::default(),
        }
    }
}

/// Which of the three during-slots a graft belongs to, decided by the phase
/// that is current when the pending child is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuringSlotKind {
    /// The before-child was running when the graft was staged.
    Before,
    /// The user action's retry loop was running when the graft was staged.
    During,
    /// The after-child was running when the graft was staged.
    After,
}
