//! The mutable tree node bound to one execution context — the public API.

use std::time::Duration;

use async_std::sync::Mutex as AsyncMutex;
use std::sync::Arc;

use crate::child::ChildArg;
use crate::context::{Context, ContextSnapshot};
use crate::error::{Error, Result};
use crate::executor;
use crate::id::ExecId;
use crate::outcome::Outcome;
use crate::template::{Template, DEFAULT_NUM_TRIES, DEFAULT_RETRY_INTERVAL};
use crate::undoer;

/// A live view onto one execution context: a template plus the id of the
/// context it addresses. Cheap to clone; clones address the same context.
pub struct Handle<P, V, E> {
    template: Template<P, V, E>,
    exec_id: ExecId,
}

impl<P, V, E> Clone for Handle<P, V, E> {
    fn clone(&self) -> Self {
        Handle {
            template: self.template.clone(),
            exec_id: self.exec_id.clone(),
        }
    }
}

/// A back-reference to a parent handle, used only by `exec_all`/`undo_all` to
/// walk up to the root. It never extends the parent's lifetime: the context
/// it addresses is owned by the template's history, not by this reference.
pub struct WeakHandle<P, V, E> {
    template: Template<P, V, E>,
    exec_id: ExecId,
}

impl<P, V, E> Clone for WeakHandle<P, V, E> {
    fn clone(&self) -> Self {
        WeakHandle {
            template: self.template.clone(),
            exec_id: self.exec_id.clone(),
        }
    }
}

impl<P, V, E> WeakHandle<P, V, E> {
    /// Recovers an owning [`Handle`] onto the same context.
    pub fn upgrade(&self) -> Handle<P, V, E> {
        Handle::from_parts(self.template.clone(), self.exec_id.clone())
    }
}

impl<P, V, E> Handle<P, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_parts(template: Template<P, V, E>, exec_id: ExecId) -> Self {
        Handle { template, exec_id }
    }

    pub(crate) fn template(&self) -> &Template<P, V, E> {
        &self.template
    }

    pub(crate) fn context_arc(&self) -> Result<Arc<AsyncMutex<Context<P, V, E>>>, V, E> {
        self.template.context_arc(&self.exec_id)
    }

    /// This handle's execution identity.
    pub fn get_exec_id(&self) -> ExecId {
        self.exec_id.clone()
    }

    /// A non-owning reference to the same context, for use as `parent`.
    pub fn downgrade(&self) -> WeakHandle<P, V, E> {
        WeakHandle {
            template: self.template.clone(),
            exec_id: self.exec_id.clone(),
        }
    }

    /// A snapshot of this context's identity and flags.
    pub async fn get_context(&self) -> Result<ContextSnapshot, V, E> {
        let arc = self.context_arc()?;
        let ctx = arc.lock().await;
        Ok(ctx.snapshot())
    }

    /// Sets this context's `parent` back-edge, used by `exec_all`/`undo_all`
    /// to find the root.
    pub async fn add_parent(&self, parent: Handle<P, V, E>) -> Result<(), V, E> {
        let arc = self.context_arc()?;
        let mut ctx = arc.lock().await;
        ctx.parent = Some(parent.downgrade());
        Ok(())
    }

    /// Clears phase flags and result buffers on this context, keeping
    /// `params`, `before_child`, and `after_child` intact, then recurses into
    /// them.
    pub fn reset<'a>(
        &'a self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), V, E>> + Send + 'a>> {
        Box::pin(async move {
            let arc = self.context_arc()?;
            let (before, after) = {
                let mut ctx = arc.lock().await;
                ctx.reset_self();
                (ctx.before_child.clone(), ctx.after_child.clone())
            };
            if let Some(before) = before {
                before.reset().await?;
            }
            if let Some(after) = after {
                after.reset().await?;
            }
            Ok(())
        })
    }

    /// Walks up `parent` to the root, then [`Handle::reset`]s from there.
    pub async fn reset_all(&self) -> Result<(), V, E> {
        self.root().await?.reset().await
    }

    async fn root(&self) -> Result<Handle<P, V, E>, V, E> {
        let mut current = self.clone();
        loop {
            let parent = {
                let arc = current.context_arc()?;
                let ctx = arc.lock().await;
                ctx.parent.clone()
            };
            match parent.map(|p| p.upgrade()) {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
    }

    /// Walks this context's before/self/after phases, running every action
    /// and hook along the way. `num_tries`/`retry_interval` override the
    /// crate's defaults for this call only.
    pub async fn exec(
        &self,
        num_tries: Option<u32>,
        retry_interval: Option<Duration>,
    ) -> Result<Vec<Outcome<V, E>>, V, E> {
        executor::exec(
            self.clone(),
            num_tries.unwrap_or(DEFAULT_NUM_TRIES),
            retry_interval.unwrap_or(DEFAULT_RETRY_INTERVAL),
        )
        .await
    }

    /// Walks this context's phases in mirror order, undoing whatever its
    /// last `exec` completed.
    pub async fn undo(
        &self,
        num_tries: Option<u32>,
        retry_interval: Option<Duration>,
    ) -> Result<Vec<Outcome<V, E>>, V, E> {
        undoer::undo(
            self.clone(),
            num_tries.unwrap_or(DEFAULT_NUM_TRIES),
            retry_interval.unwrap_or(DEFAULT_RETRY_INTERVAL),
        )
        .await
    }

    /// Like [`Handle::exec`], but walks up to the root context first.
    pub async fn exec_all(
        &self,
        num_tries: Option<u32>,
        retry_interval: Option<Duration>,
    ) -> Result<Vec<Outcome<V, E>>, V, E> {
        self.root().await?.exec(num_tries, retry_interval).await
    }

    /// Like [`Handle::undo`], but walks up to the root context first.
    pub async fn undo_all(
        &self,
        num_tries: Option<u32>,
        retry_interval: Option<Duration>,
    ) -> Result<Vec<Outcome<V, E>>, V, E> {
        self.root().await?.undo(num_tries, retry_interval).await
    }

    /// Walks the after-chain starting at `self` and appends `child` past its
    /// end, so that `[A, B, C]` reads as `A.after = B`, `B.after = C`.
    async fn attach_after(&self, child: Handle<P, V, E>) -> Result<(), V, E> {
        let mut current = self.clone();
        loop {
            let next = {
                let arc = current.context_arc()?;
                let mut guard = arc.lock().await;
                match &guard.after_child {
                    Some(existing) => Some(existing.clone()),
                    None => {
                        guard.after_child = Some(child.clone());
                        None
                    }
                }
            };
            match next {
                Some(existing) => current = existing,
                None => return Ok(()),
            }
        }
    }

    /// Collapses a collection into a single chain: the first element becomes
    /// the returned handle, the rest are appended as its after-descendants in
    /// order.
    async fn collapse_chain(handles: Vec<Handle<P, V, E>>) -> Result<Handle<P, V, E>, V, E> {
        let mut iter = handles.into_iter();
        let first = iter
            .next()
            .expect("empty collections are rejected before this point");
        for next in iter {
            first.attach_after(next).await?;
        }
        Ok(first)
    }

    /// Routes `arg` per the argument-resolution rules: a collection either
    /// collapses into a linear chain (`no_parallel`) or is wrapped in a fresh
    /// parallel composite; a single handle is used directly. If the owning
    /// context is currently executing or undoing, the resolved child is
    /// staged as the pending during-child instead of linked immediately —
    /// the executor grafts it in at the next phase boundary.
    pub async fn add_child(
        &self,
        arg: impl Into<ChildArg<P, V, E>>,
        before: bool,
        no_parallel: bool,
    ) -> Result<Handle<P, V, E>, V, E> {
        let arg = arg.into();
        if arg.is_empty_collection() {
            return Err(Error::BadInput(
                "add_child received an empty collection".to_string(),
            ));
        }
        let child = match arg {
            ChildArg::Single(h) => h,
            ChildArg::Many(handles) if no_parallel => Self::collapse_chain(handles).await?,
            ChildArg::Many(handles) => crate::parallel::wrap(&self.template, handles).await?,
        };

        child.add_parent(self.clone()).await?;

        let pending_existing = {
            let arc = self.context_arc()?;
            let mut ctx = arc.lock().await;
            if ctx.executing || ctx.undoing {
                match ctx.pending_during_child.clone() {
                    Some(existing) => Some(existing),
                    None => {
                        ctx.pending_during_child = Some(child.clone());
                        None
                    }
                }
            } else {
                if before {
                    if let Some(old) = ctx.before_child.take() {
                        drop(ctx);
                        // Left-rotation: the new child becomes the root
                        // before-child, the previous one becomes its own.
                        let child_arc = child.context_arc()?;
                        let mut child_ctx = child_arc.lock().await;
                        child_ctx.before_child = Some(old);
                        drop(child_ctx);
                        let arc = self.context_arc()?;
                        let mut ctx = arc.lock().await;
                        ctx.before_child = Some(child.clone());
                    } else {
                        ctx.before_child = Some(child.clone());
                    }
                    return Ok(self.clone());
                } else {
                    drop(ctx);
                    self.attach_after(child.clone()).await?;
                    return Ok(self.clone());
                }
            }
        };

        if let Some(existing) = pending_existing {
            existing.add_child(child, before, no_parallel).await?;
        }

        Ok(self.clone())
    }
}
