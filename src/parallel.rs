//! The parallel composite: a single node that fans its children out
//! concurrently instead of presenting its own before/self/after phases.
//!
//! `Handle::add_child` wraps a collection in one of these whenever the
//! caller doesn't ask for a linear (`no_parallel`) chain. The composite is
//! not ternary itself — it is one opaque child from the surrounding tree's
//! point of view — so `executor::run_parallel`/`undoer::run_parallel_undo`
//! short-circuit the usual phase sequence entirely whenever a context's
//! `parallel_children` is populated.

use crate::error::Result;
use crate::handle::Handle;
use crate::template::Template;

/// Wraps `children` in a fresh parallel composite sharing `template`'s id
/// source and clock. The composite has no `exec`/`undo` of its own, so its
/// own params are never read by user code; it borrows its first child's
/// params purely to give its context a `P` value to hold.
pub(crate) async fn wrap<P, V, E>(
    template: &Template<P, V, E>,
    children: Vec<Handle<P, V, E>>,
) -> Result<Handle<P, V, E>, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let params = {
        let arc = children[0].context_arc()?;
        let ctx = arc.lock().await;
        ctx.params.clone()
    };
    let bare = template.bare();
    Ok(bare.create_parallel(params, children))
}
