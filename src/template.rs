//! The immutable operation definition shared by every instance created from it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};
use std::time::Duration;

use async_std::sync::Mutex as AsyncMutex;
use slog::Logger;

use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::hooks::{HookArgs, Hooks};
use crate::id::{AtomicIdSource, ExecId, IdSource};
use crate::logs::root_logger;

/// The default number of attempts a retry loop gets when a caller doesn't
/// specify one.
pub const DEFAULT_NUM_TRIES: u32 = 1;
/// The default pause between retry attempts when a caller doesn't specify
/// one.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// A boxed, `Send` future, the shape every action and hook closure returns.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// The user-supplied action run during the retry loop (`exec`) or its
/// reverse (`undo`). Both have the same shape: given the params, a snapshot
/// of the context, and a handle to reentrantly graft children with, produce
/// a value or raise an error.
pub type ActionFn<P, V, E> = dyn Fn(HookArgs<P, V, E>) -> BoxFuture<'static, std::result::Result<V, E>>
    + Send
    + Sync;

struct TemplateInner<P, V, E> {
    exec_fn: Option<Arc<ActionFn<P, V, E>>>,
    undo_fn: Option<Arc<ActionFn<P, V, E>>>,
    hooks: Hooks<P, V, E>,
    id_source: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
    history: SyncMutex<HashMap<ExecId, Arc<AsyncMutex<Context<P, V, E>>>>>,
    logger: Logger,
}

/// An immutable operation definition: the user's `exec`, `undo`, and hook
/// map, plus the injected collaborators used to mint ids and to sleep
/// between retries. Cheap to clone — every clone shares the same history.
pub struct Template<P, V, E> {
    inner: Arc<TemplateInner<P, V, E>>,
}

impl<P, V, E> Clone for Template<P, V, E> {
    fn clone(&self) -> Self {
        Template {
            inner: self.inner.clone(),
        }
    }
}

/// Builds a [`Template`] field by field: an optional `exec`, an optional
/// `undo`, a hook map, and the injected id source/clock/logger collaborators.
pub struct TemplateBuilder<P, V, E> {
    exec_fn: Option<Arc<ActionFn<P, V, E>>>,
    undo_fn: Option<Arc<ActionFn<P, V, E>>>,
    hooks: Hooks<P, V, E>,
    id_source: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
    logger: Option<Logger>,
}

impl<P, V, E> Default for TemplateBuilder<P, V, E> {
    fn default() -> Self {
        Self {
            exec_fn: None,
            undo_fn: None,
            hooks: Hooks::new(),
            id_source: Arc::new(AtomicIdSource::new()),
            clock: Arc::new(SystemClock),
            logger: None,
        }
    }
}

impl<P, V, E> TemplateBuilder<P, V, E> {
    /// A builder with no `exec`/`undo`/hooks and the default collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user action run during the retry loop.
    pub fn exec<F>(mut self, f: F) -> Self
    where
        F: Fn(HookArgs<P, V, E>) -> BoxFuture<'static, std::result::Result<V, E>>
            + Send
            + Sync
            + 'static,
    {
        self.exec_fn = Some(Arc::new(f));
        self
    }

    /// Sets the user action run during the undo retry loop.
    pub fn undo<F>(mut self, f: F) -> Self
    where
        F: Fn(HookArgs<P, V, E>) -> BoxFuture<'static, std::result::Result<V, E>>
            + Send
            + Sync
            + 'static,
    {
        self.undo_fn = Some(Arc::new(f));
        self
    }

    /// Replaces the entire hook map.
    pub fn hooks(mut self, hooks: Hooks<P, V, E>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Overrides the default id source.
    pub fn id_source(mut self, id_source: Arc<dyn IdSource>) -> Self {
        self.id_source = id_source;
        self
    }

    /// Overrides the default clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the default logger (otherwise `crate::logs::root_logger()`).
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Finishes building the template.
    pub fn build(self) -> Template<P, V, E> {
        let logger = self.logger.unwrap_or_else(root_logger);
        Template {
            inner: Arc::new(TemplateInner {
                exec_fn: self.exec_fn,
                undo_fn: self.undo_fn,
                hooks: self.hooks,
                id_source: self.id_source,
                clock: self.clock,
                history: SyncMutex::new(HashMap::new()),
                logger,
            }),
        }
    }
}

impl<P, V, E> Template<P, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Starts building a template.
    pub fn builder() -> TemplateBuilder<P, V, E> {
        TemplateBuilder::new()
    }

    pub(crate) fn exec_fn(&self) -> Option<&Arc<ActionFn<P, V, E>>> {
        self.inner.exec_fn.as_ref()
    }

    pub(crate) fn undo_fn(&self) -> Option<&Arc<ActionFn<P, V, E>>> {
        self.inner.undo_fn.as_ref()
    }

    pub(crate) fn hooks(&self) -> &Hooks<P, V, E> {
        &self.inner.hooks
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// A template with no `exec`/`undo`/hooks of its own, sharing this
    /// template's id source and clock. Used to build the structural buckets
    /// that record during-children (see [`crate::during`]) and, by the
    /// parallel composite, as the carrier for its fan-out logic.
    pub(crate) fn bare(&self) -> Template<P, V, E> {
        Template {
            inner: Arc::new(TemplateInner {
                exec_fn: None,
                undo_fn: None,
                hooks: Hooks::new(),
                id_source: self.inner.id_source.clone(),
                clock: self.inner.clock.clone(),
                history: SyncMutex::new(HashMap::new()),
                logger: self.inner.logger.clone(),
            }),
        }
    }

    /// Allocates a fresh context under a newly minted id and returns a
    /// handle onto it.
    pub fn create(&self, params: P) -> Handle<P, V, E> {
        self.create_with_retry(params, DEFAULT_NUM_TRIES, DEFAULT_RETRY_INTERVAL)
    }

    /// Like [`Template::create`], but with an explicit retry budget and
    /// pause instead of the crate's defaults.
    pub fn create_with_retry(
        &self,
        params: P,
        num_tries: u32,
        retry_interval: Duration,
    ) -> Handle<P, V, E> {
        let exec_id = self.inner.id_source.next_id();
        let context = Context::new(exec_id.clone(), params, num_tries, retry_interval);
        let context = Arc::new(AsyncMutex::new(context));
        self.inner
            .history
            .lock()
            .unwrap()
            .insert(exec_id.clone(), context);
        Handle::from_parts(self.clone(), exec_id)
    }

    /// Allocates a context for a parallel composite: a node that is not
    /// ternary itself and instead fans `children` out concurrently when
    /// executed or undone. `params` only needs to satisfy the same bound as
    /// every other context; the composite's own action functions are never
    /// consulted.
    pub(crate) fn create_parallel(
        &self,
        params: P,
        children: Vec<Handle<P, V, E>>,
    ) -> Handle<P, V, E> {
        let handle = self.create(params);
        let arc = self
            .context_arc(&handle.get_exec_id())
            .expect("just-created context must be present in its own template's history");
        let mut guard = arc
            .try_lock()
            .expect("a just-created context cannot yet be contended");
        guard.parallel_children = Some(children);
        drop(guard);
        handle
    }

    /// Returns a handle for an existing execution id.
    pub fn get(&self, exec_id: &ExecId) -> Result<Handle<P, V, E>, V, E> {
        if self.inner.history.lock().unwrap().contains_key(exec_id) {
            Ok(Handle::from_parts(self.clone(), exec_id.clone()))
        } else {
            Err(Error::NotFound(exec_id.clone()))
        }
    }

    pub(crate) fn context_arc(
        &self,
        exec_id: &ExecId,
    ) -> Result<Arc<AsyncMutex<Context<P, V, E>>>, V, E> {
        self.inner
            .history
            .lock()
            .unwrap()
            .get(exec_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(exec_id.clone()))
    }
}
