use thiserror::Error;

use crate::id::ExecId;
use crate::outcome::Outcome;

/// The error type for the engine.
///
/// It can represent any kind of error the tree walk might encounter. A
/// failure raised by a user action and a failure raised by a child subtree
/// are not distinguished at the type level: both surface as
/// [`Error::Failed`], carrying the walk's accumulated outcomes up to and
/// including the one that gave up. What differs between them is only *where*
/// in the walk the vector stops.
#[derive(Error, Debug)]
pub enum Error<V, E> {
    /// A malformed `add_child` argument, or an operation requested by an
    /// execution id that was never minted.
    #[error("bad input: {0}")]
    BadInput(String),
    /// An `exec_id` unknown to the template's history.
    #[error("no execution found for id '{0}'")]
    NotFound(ExecId),
    /// `undo` was invoked while the context was already undoing.
    #[error("context '{0}' is already undoing")]
    Conflict(ExecId),
    /// The walk failed; carries every outcome recorded so far, in order.
    #[error("operation walk failed after {} outcome(s)", .0.len())]
    Failed(Vec<Outcome<V, E>>),
}

impl<V, E> Error<V, E> {
    /// Returns the accumulated outcomes, if this error carries any.
    pub fn outcomes(&self) -> Option<&[Outcome<V, E>]> {
        match self {
            Error::Failed(outcomes) => Some(outcomes.as_slice()),
            _ => None,
        }
    }
}

pub type Result<T, V, E> = std::result::Result<T, Error<V, E>>;
