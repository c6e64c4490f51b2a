//! The phase-sequencing state machine: the heart of `exec`.
//!
//! Walks before-slot hooks, the before-child, during-slot hooks wrapping a
//! bounded retry loop around the user action, after-slot hooks, and the
//! after-child, draining any dynamically-grafted during-child after every
//! hook and phase boundary along the way.

use std::time::Duration;

use slog::{debug, trace, warn};

use crate::during::DuringSlotKind;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::hooks::{kind, HookArgs, HookKind};
use crate::outcome::Outcome;

async fn invoke_hook<P, V, E>(handle: &Handle<P, V, E>, hook_kind: HookKind) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let hook = match handle.template().hooks().get(hook_kind) {
        Some(hook) => hook,
        None => return Ok(()),
    };
    let (params, snapshot) = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        (ctx.params.clone(), ctx.snapshot())
    };
    let log = handle.template().logger().clone();
    trace!(log, "firing hook"; "exec_id" => snapshot.exec_id.to_string());
    let args = HookArgs {
        params,
        context: snapshot,
        handle: handle.clone(),
    };
    match hook(args).await {
        Ok(Some(value)) => {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.exec_results.push(Outcome::Value(value));
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.exec_results.push(Outcome::Failure(e));
            let accumulated = ctx.exec_results.clone();
            ctx.executing = false;
            warn!(log, "hook raised, aborting walk"; "exec_id" => ctx.exec_id.to_string());
            Err(Error::Failed(accumulated))
        }
    }
}

/// Executes and stashes the staged `pending_during_child`, if any, looping in
/// case executing it reentrantly stages another one on the same context.
async fn drain_pending<P, V, E>(handle: &Handle<P, V, E>, slot: DuringSlotKind) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    loop {
        let staged = {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            match ctx.pending_during_child.take() {
                Some(child) => Some((child, ctx.num_tries, ctx.retry_interval)),
                None => None,
            }
        };
        let (pending, num_tries, retry_interval) = match staged {
            Some(t) => t,
            None => return Ok(()),
        };

        let log = handle.template().logger().clone();
        debug!(log, "draining dynamically grafted child"; "exec_id" => pending.get_exec_id().to_string());
        let result = pending.exec(Some(num_tries), Some(retry_interval)).await;

        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        let attach_before = match slot {
            DuringSlotKind::Before => !ctx.phases.before_child_succeeded,
            DuringSlotKind::During => !ctx.phases.exec_function_succeeded,
            DuringSlotKind::After => !ctx.phases.after_child_succeeded,
        };
        let bucket = match slot {
            DuringSlotKind::Before => &mut ctx.during_children.before_slot,
            DuringSlotKind::During => &mut ctx.during_children.during_slot,
            DuringSlotKind::After => &mut ctx.during_children.after_slot,
        };
        match result {
            Ok(outcomes) => {
                bucket.push(pending, attach_before);
                ctx.exec_results.extend(outcomes);
            }
            Err(Error::Failed(outcomes)) => {
                bucket.push(pending, attach_before);
                ctx.exec_results.extend(outcomes);
                let accumulated = ctx.exec_results.clone();
                ctx.executing = false;
                return Err(Error::Failed(accumulated));
            }
            Err(other) => return Err(other),
        }
    }
}

async fn exec_child<P, V, E>(
    handle: &Handle<P, V, E>,
    child: Option<Handle<P, V, E>>,
    mark_executed: impl FnOnce(&mut crate::context::Context<P, V, E>),
    mark_succeeded: impl FnOnce(&mut crate::context::Context<P, V, E>),
) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        mark_executed(&mut ctx);
    }
    let child = match child {
        Some(c) => c,
        None => return Ok(()),
    };
    let (num_tries, retry_interval) = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        (ctx.num_tries, ctx.retry_interval)
    };
    match child.exec(Some(num_tries), Some(retry_interval)).await {
        Ok(outcomes) => {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            mark_succeeded(&mut ctx);
            ctx.exec_results.extend(outcomes);
            Ok(())
        }
        Err(Error::Failed(outcomes)) => {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.exec_results.extend(outcomes);
            let accumulated = ctx.exec_results.clone();
            ctx.executing = false;
            Err(Error::Failed(accumulated))
        }
        Err(other) => Err(other),
    }
}

pub(crate) async fn exec<P, V, E>(
    handle: Handle<P, V, E>,
    num_tries: u32,
    retry_interval: Duration,
) -> Result<Vec<Outcome<V, E>>, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let needs_implicit_reset = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        !ctx.executing
            && !ctx.undoing
            && (ctx.phases.completed_before_child
                || ctx.phases.completed_exec_function
                || ctx.phases.completed_after_child)
    };
    if needs_implicit_reset {
        handle.reset().await?;
    }

    let is_parallel = {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        ctx.executing = true;
        ctx.num_tries = num_tries;
        ctx.retry_interval = retry_interval;
        ctx.parallel_children.is_some()
    };

    if is_parallel {
        run_parallel(&handle).await
    } else {
        run_phases(&handle).await
    }
}

/// Fans a parallel composite's children out concurrently and joins without
/// short-circuiting: every child's `exec` runs exactly once regardless of
/// whether siblings fail.
async fn run_parallel<P, V, E>(handle: &Handle<P, V, E>) -> Result<Vec<Outcome<V, E>>, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let (children, num_tries, retry_interval) = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        (
            ctx.parallel_children
                .clone()
                .expect("run_parallel only called when parallel_children is Some"),
            ctx.num_tries,
            ctx.retry_interval,
        )
    };

    let log = handle.template().logger().clone();
    debug!(log, "parallel composite: fanning out"; "children" => children.len());

    let futures = children.into_iter().map(|child| {
        async move { child.exec(Some(num_tries), Some(retry_interval)).await }
    });
    let results = futures::future::join_all(futures).await;

    let mut accumulated = Vec::new();
    let mut any_failed = false;
    for result in results {
        match result {
            Ok(outcomes) => accumulated.extend(outcomes),
            Err(Error::Failed(outcomes)) => {
                accumulated.extend(outcomes);
                any_failed = true;
            }
            Err(other) => return Err(other),
        }
    }

    let arc = handle.context_arc()?;
    let mut ctx = arc.lock().await;
    ctx.exec_results.extend(accumulated);
    ctx.executing = false;
    if any_failed {
        Err(Error::Failed(ctx.exec_results.clone()))
    } else {
        Ok(ctx.exec_results.clone())
    }
}

async fn run_phases<P, V, E>(handle: &Handle<P, V, E>) -> Result<Vec<Outcome<V, E>>, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // Step 1: before-slot leading hooks.
    invoke_hook(handle, kind::PRE_BEFORE).await?;
    invoke_hook(handle, kind::PRE_BEFORE_EXEC_ONLY).await?;
    drain_pending(handle, DuringSlotKind::Before).await?;

    // Step 2: before-child.
    let before_child = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.before_child.clone()
    };
    exec_child(
        handle,
        before_child,
        |ctx| ctx.phases.before_child_executed = ctx.before_child.is_some(),
        |ctx| ctx.phases.before_child_succeeded = true,
    )
    .await?;
    drain_pending(handle, DuringSlotKind::Before).await?;

    // Step 3: before-slot trailing hooks.
    invoke_hook(handle, kind::POST_BEFORE).await?;
    invoke_hook(handle, kind::POST_BEFORE_EXEC_ONLY).await?;
    {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        ctx.phases.completed_before_child = true;
    }
    drain_pending(handle, DuringSlotKind::Before).await?;

    // Step 4: during-slot leading hooks.
    invoke_hook(handle, kind::PRE_DURING).await?;
    invoke_hook(handle, kind::PRE_DURING_EXEC_ONLY).await?;
    drain_pending(handle, DuringSlotKind::During).await?;

    // Step 5: retry loop around the user action.
    run_retry_loop(handle).await?;

    // Step 6: raise or append the attempt buffer.
    {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        if !ctx.phases.exec_function_succeeded {
            let accumulated = ctx.op_results.clone();
            ctx.executing = false;
            return Err(Error::Failed(accumulated));
        }
        let attempt_results = std::mem::take(&mut ctx.op_results);
        ctx.exec_results.extend(attempt_results);
    }

    // Step 7: during-slot trailing hooks.
    invoke_hook(handle, kind::POST_DURING).await?;
    invoke_hook(handle, kind::POST_DURING_EXEC_ONLY).await?;
    {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        ctx.phases.completed_exec_function = true;
    }
    drain_pending(handle, DuringSlotKind::During).await?;

    // Step 8: after-slot leading hooks.
    invoke_hook(handle, kind::PRE_AFTER).await?;
    invoke_hook(handle, kind::PRE_AFTER_EXEC_ONLY).await?;
    drain_pending(handle, DuringSlotKind::After).await?;

    // Step 9: after-child.
    let after_child = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.after_child.clone()
    };
    exec_child(
        handle,
        after_child,
        |ctx| ctx.phases.after_child_executed = ctx.after_child.is_some(),
        |ctx| ctx.phases.after_child_succeeded = true,
    )
    .await?;
    drain_pending(handle, DuringSlotKind::After).await?;

    // Step 10: after-slot trailing hooks.
    invoke_hook(handle, kind::POST_AFTER).await?;
    invoke_hook(handle, kind::POST_AFTER_EXEC_ONLY).await?;
    drain_pending(handle, DuringSlotKind::After).await?;
    let arc = handle.context_arc()?;
    let mut ctx = arc.lock().await;
    ctx.phases.completed_after_child = true;
    ctx.executing = false;
    Ok(ctx.exec_results.clone())
}

async fn run_retry_loop<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let (num_tries, exec_fn) = (
        {
            let arc = handle.context_arc()?;
            let ctx = arc.lock().await;
            ctx.num_tries
        },
        handle.template().exec_fn().cloned(),
    );

    let log = handle.template().logger().clone();
    let exec_fn = match exec_fn {
        Some(f) => f,
        None => {
            // No user action: the attempt trivially succeeds so the
            // surrounding phases proceed as if it had.
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.phases.exec_function_succeeded = true;
            return Ok(());
        }
    };

    {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        ctx.phases.exec_function_executed = true;
    }

    for attempt in 1..=num_tries.max(1) {
        let (params, snapshot, retry_interval) = {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.begin_exec_attempt(attempt);
            (ctx.params.clone(), ctx.snapshot(), ctx.retry_interval)
        };

        invoke_hook(handle, kind::PRE_DURING_TRY).await?;
        invoke_hook(handle, kind::PRE_DURING_TRY_EXEC_ONLY).await?;
        drain_pending(handle, DuringSlotKind::During).await?;

        let args = HookArgs {
            params,
            context: snapshot,
            handle: handle.clone(),
        };
        let attempt_result = exec_fn(args).await;

        let succeeded = match attempt_result {
            Ok(value) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.op_results.push(Outcome::Value(value));
                ctx.phases.exec_function_succeeded = true;
                true
            }
            Err(e) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.op_results.push(Outcome::Failure(e));
                warn!(log, "exec attempt failed, will retry"; "attempt" => attempt, "exec_id" => ctx.exec_id.to_string());
                drop(ctx);
                if attempt < num_tries {
                    handle.template().clock().delay(retry_interval).await;
                }
                false
            }
        };

        invoke_hook(handle, kind::POST_DURING_TRY).await?;
        invoke_hook(handle, kind::POST_DURING_TRY_EXEC_ONLY).await?;
        drain_pending(handle, DuringSlotKind::During).await?;

        if succeeded {
            break;
        }
    }

    Ok(())
}

