//! Loop lifecycle status
//!
//! The controller drives a loop through a small state machine:
//! Init -> Running -> (Paused <-> Running) -> Completed | Failed | Terminated.
//! The three terminal states admit no further transitions.

use serde::{Deserialize, Serialize};

/// Status of a loop run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    /// Created, lock not yet acquired
    Init,
    /// Actively iterating
    Running,
    /// Externally paused (resumable; the clock keeps running)
    Paused,
    /// Completion confirmed by the executor
    Completed,
    /// A failure or limit condition fired
    Failed,
    /// Stopped by an external interrupt
    Terminated,
}

impl LoopStatus {
    /// Returns true if the loop reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopStatus::Completed | LoopStatus::Failed | LoopStatus::Terminated
        )
    }

    /// Returns true if the loop has started and has not yet finished
    pub fn is_active(&self) -> bool {
        matches!(self, LoopStatus::Running | LoopStatus::Paused)
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoopStatus::Init => "init",
            LoopStatus::Running => "running",
            LoopStatus::Paused => "paused",
            LoopStatus::Completed => "completed",
            LoopStatus::Failed => "failed",
            LoopStatus::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}
