//! Symmetric reverse traversal: undoes exactly what exec touched, in mirror
//! order, including the during-children grafted along the way.

use slog::{debug, warn};

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
    let args = HookArgs {
        params,
        context: snapshot,
        handle: handle.clone(),
    };
    match hook(args).await {
        Ok(Some(value)) => {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.undo_results.push(Outcome::Value(value));
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.undo_results.push(Outcome::Failure(e));
            let accumulated = ctx.undo_results.clone();
            ctx.undoing = false;
            Err(Error::Failed(accumulated))
        }
    }
}

/// Undoes every handle in `children`, oldest-grafted last, folding each
/// result into `undo_results`; stops and re-raises on the first failure.
async fn undo_each<P, V, E>(
    handle: &Handle<P, V, E>,
    children: Vec<Handle<P, V, E>>,
) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    for child in children {
        let (num_tries, retry_interval) = {
            let arc = handle.context_arc()?;
            let ctx = arc.lock().await;
            (ctx.num_tries, ctx.retry_interval)
        };
        match child.undo(Some(num_tries), Some(retry_interval)).await {
            Ok(outcomes) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.undo_results.extend(outcomes);
            }
            Err(Error::Failed(outcomes)) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.undo_results.extend(outcomes);
                let accumulated = ctx.undo_results.clone();
                ctx.undoing = false;
                return Err(Error::Failed(accumulated));
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

async fn undo_after_slot_after_position<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let children = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.during_children
            .after_slot
            .after_position_reversed()
            .cloned()
            .collect::<Vec<_>>()
    };
    undo_each(handle, children).await
}

async fn undo_after_slot_before_position<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let children = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.during_children
            .after_slot
            .before_position_reversed()
            .cloned()
            .collect::<Vec<_>>()
    };
    undo_each(handle, children).await
}

async fn undo_during_slot_after_position<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let children = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.during_children
            .during_slot
            .after_position_reversed()
            .cloned()
            .collect::<Vec<_>>()
    };
    undo_each(handle, children).await
}

async fn undo_during_slot_before_position<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let children = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.during_children
            .during_slot
            .before_position_reversed()
            .cloned()
            .collect::<Vec<_>>()
    };
    undo_each(handle, children).await
}

async fn undo_before_slot_after_position<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let children = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.during_children
            .before_slot
            .after_position_reversed()
            .cloned()
            .collect::<Vec<_>>()
    };
    undo_each(handle, children).await
}

async fn undo_before_slot_before_position<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let children = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.during_children
            .before_slot
            .before_position_reversed()
            .cloned()
            .collect::<Vec<_>>()
    };
    undo_each(handle, children).await
}

pub(crate) async fn undo<P, V, E>(
    handle: Handle<P, V, E>,
    num_tries: u32,
    retry_interval: std::time::Duration,
) -> Result<Vec<Outcome<V, E>>, V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let is_parallel = {
        let arc = handle.context_arc()?;
        let mut ctx = arc.lock().await;
        if ctx.undoing {
            return Err(Error::Conflict(ctx.exec_id.clone()));
        }
        ctx.undoing = true;
        ctx.num_tries = num_tries;
        ctx.retry_interval = retry_interval;
        ctx.parallel_children.is_some()
    };

    if is_parallel {
        return run_parallel_undo(&handle).await;
    }

    let log = handle.template().logger().clone();
    debug!(log, "undo: starting mirror walk"; "exec_id" => handle.get_exec_id().to_string());

    // Step 1.
    invoke_hook(&handle, kind::POST_AFTER_UNDO_ONLY).await?;
    invoke_hook(&handle, kind::POST_AFTER).await?;

    // Step 2.
    undo_after_slot_after_position(&handle).await?;

    // Step 3.
    let after_child = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        if ctx.phases.after_child_executed {
            ctx.after_child.clone()
        } else {
            None
        }
    };
    if let Some(after_child) = after_child {
        let (num_tries, retry_interval) = {
            let arc = handle.context_arc()?;
            let ctx = arc.lock().await;
            (ctx.num_tries, ctx.retry_interval)
        };
        match after_child.undo(Some(num_tries), Some(retry_interval)).await {
            Ok(outcomes) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.undo_results.extend(outcomes);
            }
            Err(Error::Failed(outcomes)) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.undo_results.extend(outcomes);
                let accumulated = ctx.undo_results.clone();
                ctx.undoing = false;
                return Err(Error::Failed(accumulated));
            }
            Err(other) => return Err(other),
        }
    }

    // Step 4.
    undo_after_slot_before_position(&handle).await?;

    // Step 5.
    invoke_hook(&handle, kind::PRE_AFTER_UNDO_ONLY).await?;
    invoke_hook(&handle, kind::PRE_AFTER).await?;
    invoke_hook(&handle, kind::POST_DURING_UNDO_ONLY).await?;
    invoke_hook(&handle, kind::POST_DURING).await?;

    // Step 6.
    undo_during_slot_after_position(&handle).await?;

    // Step 7.
    run_undo_retry_loop(&handle).await?;

    // Step 8.
    undo_during_slot_before_position(&handle).await?;

    // Step 9.
    invoke_hook(&handle, kind::PRE_DURING_UNDO_ONLY).await?;
    invoke_hook(&handle, kind::PRE_DURING).await?;
    invoke_hook(&handle, kind::POST_BEFORE_UNDO_ONLY).await?;
    invoke_hook(&handle, kind::POST_BEFORE).await?;

    // Step 10.
    undo_before_slot_after_position(&handle).await?;

    // Step 11.
    let before_child = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        if ctx.phases.before_child_executed {
            ctx.before_child.clone()
        } else {
            None
        }
    };
    if let Some(before_child) = before_child {
        let (num_tries, retry_interval) = {
            let arc = handle.context_arc()?;
            let ctx = arc.lock().await;
            (ctx.num_tries, ctx.retry_interval)
        };
        match before_child.undo(Some(num_tries), Some(retry_interval)).await {
            Ok(outcomes) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.undo_results.extend(outcomes);
            }
            Err(Error::Failed(outcomes)) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.undo_results.extend(outcomes);
                let accumulated = ctx.undo_results.clone();
                ctx.undoing = false;
                return Err(Error::Failed(accumulated));
            }
            Err(other) => return Err(other),
        }
    }

    // Step 12.
    undo_before_slot_before_position(&handle).await?;

    // Step 13.
    invoke_hook(&handle, kind::PRE_BEFORE_UNDO_ONLY).await?;
    invoke_hook(&handle, kind::PRE_BEFORE).await?;

    let arc = handle.context_arc()?;
    let mut ctx = arc.lock().await;
    ctx.undoing = false;
    Ok(ctx.undo_results.clone())
}

/// Mirrors `executor::run_parallel` for undo: every child's `undo` runs
/// exactly once, concurrently, regardless of whether siblings fail.
async fn run_parallel_undo<P, V, E>(handle: &Handle<P, V, E>) -> Result<Vec<Outcome<V, E>>, V, E>
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
                .expect("run_parallel_undo only called when parallel_children is Some"),
            ctx.num_tries,
            ctx.retry_interval,
        )
    };

    let futures = children
        .into_iter()
        .map(|child| async move { child.undo(Some(num_tries), Some(retry_interval)).await });
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
    ctx.undo_results.extend(accumulated);
    ctx.undoing = false;
    if any_failed {
        Err(Error::Failed(ctx.undo_results.clone()))
    } else {
        Ok(ctx.undo_results.clone())
    }
}

async fn run_undo_retry_loop<P, V, E>(handle: &Handle<P, V, E>) -> Result<(), V, E>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let should_run = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.phases.exec_function_executed && ctx.phases.exec_function_succeeded
    };
    if !should_run {
        return Ok(());
    }

    let undo_fn = match handle.template().undo_fn().cloned() {
        Some(f) => f,
        None => return Ok(()),
    };

    let log = handle.template().logger().clone();
    let num_tries = {
        let arc = handle.context_arc()?;
        let ctx = arc.lock().await;
        ctx.num_tries
    };

    let mut succeeded = false;
    for attempt in 1..=num_tries.max(1) {
        let (params, snapshot, retry_interval) = {
            let arc = handle.context_arc()?;
            let mut ctx = arc.lock().await;
            ctx.phases.undo_function_attempt = attempt;
            (ctx.params.clone(), ctx.snapshot(), ctx.retry_interval)
        };
        let args = HookArgs {
            params,
            context: snapshot,
            handle: handle.clone(),
        };
        match undo_fn(args).await {
            Ok(value) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.op_undo_results.push(Outcome::Value(value));
                ctx.phases.undo_function_succeeded = true;
                succeeded = true;
            }
            Err(e) => {
                let arc = handle.context_arc()?;
                let mut ctx = arc.lock().await;
                ctx.op_undo_results.push(Outcome::Failure(e));
                warn!(log, "undo attempt failed, will retry"; "attempt" => attempt, "exec_id" => ctx.exec_id.to_string());
                drop(ctx);
                if attempt < num_tries {
                    handle.template().clock().delay(retry_interval).await;
                }
            }
        }
        if succeeded {
            break;
        }
    }

    let arc = handle.context_arc()?;
    let mut ctx = arc.lock().await;
    if !succeeded {
        let accumulated = std::mem::take(&mut ctx.op_undo_results);
        ctx.undoing = false;
        return Err(Error::Failed(accumulated));
    }
    let attempt_results = std::mem::take(&mut ctx.op_undo_results);
    ctx.undo_results.extend(attempt_results);
    Ok(())
}
