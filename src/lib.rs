#![warn(unused, missing_docs)]
//!
//! A command-pattern operation engine for composing trees of reversible
//! actions that execute in a defined order, retry on failure, and undo in
//! the exact reverse of the order in which they succeeded.
//!
//! An operation is a *template*: an optional `exec`, an optional `undo`, and
//! a map of lifecycle hooks. Calling `create` on a template allocates a
//! *handle* bound to a fresh execution context. Handles are arranged into a
//! ternary tree — `before_child`, the template's own action, `after_child`
//! — via `add_child`; calling `exec` on the root walks that tree, running
//! every action and hook along the way. An action running mid-walk may graft
//! new subtrees onto itself with `add_child`; the executor weaves those in
//! as *during-children* and replays them, in reverse, when `undo` walks the
//! tree back.
//!
//! Goals
//! -----
//!
//! - Orchestrate sequences of side-effecting actions as a single
//!   transactional unit that can roll back partial work.
//! - Bounded retry with backoff around the user action, without retrying an
//!   already-run child subtree.
//! - A built-in parallel composite for fanning children out concurrently
//!   without giving up the same undo guarantees.
//!
//! Non-goals
//! ---------
//!
//! - Durable persistence or cross-process coordination.
//! - Automatic cycle detection — callers must not form cycles.
//! - Preemption or timeout of a running user action.
//!
//! How to build
//! ------------
//!
//! `cargo build [--release]`. See `src/bin/demo.rs` for a runnable example
//! and `EngineConfig` for the retry defaults a deployment can set in a TOML
//! file.

mod child;
mod clock;
mod config;
mod context;
mod during;
mod error;
mod executor;
mod handle;
mod hooks;
mod id;
mod logs;
mod outcome;
mod parallel;
mod phases;
mod template;
mod undoer;

pub use child::ChildArg;
pub use clock::{Clock, ImmediateClock, SystemClock};
pub use config::EngineConfig;
pub use context::ContextSnapshot;
pub use error::{Error, Result};
pub use handle::{Handle, WeakHandle};
pub use hooks::{kind, HookArgs, HookKind, HookPoint, Hooks, Specialization};
pub use id::{AtomicIdSource, ExecId, IdSource};
pub use logs::init as init_logging;
pub use outcome::Outcome;
pub use phases::Phases;
pub use template::{Template, TemplateBuilder, DEFAULT_NUM_TRIES, DEFAULT_RETRY_INTERVAL};
