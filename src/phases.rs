//! The flag set recording what has happened to one execution context.

/// Tracks which phases of a walk have started, succeeded, or completed.
///
/// Undo only touches phases whose `*_executed` flag is set: no undo is ever
/// invoked for work that never began.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Phases {
    /// The before-child step was entered.
    pub before_child_executed: bool,
    /// The before-child step ran without raising.
    pub before_child_succeeded: bool,
    /// The before-child step, including its trailing hooks, is done.
    pub completed_before_child: bool,

    /// The retry loop around the user action was entered.
    pub exec_function_executed: bool,
    /// The retry loop ended with a successful attempt.
    pub exec_function_succeeded: bool,
    /// The retry loop, including its trailing hooks, is done.
    pub completed_exec_function: bool,
    /// How many attempts the retry loop has made so far.
    pub exec_function_attempt: u32,

    /// The after-child step was entered.
    pub after_child_executed: bool,
    /// The after-child step ran without raising.
    pub after_child_succeeded: bool,
    /// The after-child step, including its trailing hooks, is done.
    pub completed_after_child: bool,

    /// How many attempts the undo retry loop has made so far.
    pub undo_function_attempt: u32,
    /// The undo retry loop ended with a successful attempt.
    pub undo_function_succeeded: bool,
}

impl Phases {
    /// A fresh, all-`false`/zero flag set.
    pub fn new() -> Self {
        Self::default()
    }
}
