/// Run state definitions
///
/// A run moves through
/// `Authorizing -> LockAcquiring -> (Skipped | Running -> Finalizing) -> Released`.
use std::fmt;
use thiserror::Error;

/// Represents the current phase of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Checking the kill switch, credential and invocation context
    Authorizing,

    /// Trying to take the job lock
    LockAcquiring,

    // ===== Terminal Skip State =====
    /// Another run holds the lock; nothing was done and nothing is released
    Skipped,

    /// Workers are processing seeds
    Running,

    /// Aggregating results and recording run history
    Finalizing,

    // ===== Terminal State =====
    /// The lock has been released
    Released,
}

/// An attempted transition that the state machine does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid run state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

impl RunState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Released)
    }

    /// Returns true while the run holds the job lock
    pub fn holds_lock(&self) -> bool {
        matches!(self, Self::Running | Self::Finalizing)
    }

    /// Checks the transition table
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Authorizing, Self::LockAcquiring)
                | (Self::LockAcquiring, Self::Skipped)
                | (Self::LockAcquiring, Self::Running)
                | (Self::Running, Self::Finalizing)
                | (Self::Running, Self::Released)
                | (Self::Finalizing, Self::Released)
        )
    }

    /// Moves to `next`, logging the transition
    pub fn advance(&mut self, next: RunState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::debug!(from = %self, to = %next, "Run state transition");
        *self = next;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorizing => "authorizing",
            Self::LockAcquiring => "lock_acquiring",
            Self::Skipped => "skipped",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
