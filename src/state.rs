//! Mutable per-run loop state
//!
//! LoopState is owned exclusively by the controller and mutated exactly once
//! per iteration, through `apply`. Elapsed time is computed on demand from
//! the start instant, never stored, so clock drift cannot accumulate.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::domain::IterationSignal;
use crate::id::now_ms;

/// Per-run counters, mutated once per iteration
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Completed iterations, monotonically increasing from 0
    pub iteration: u32,
    /// Monotonic start instant, set once at creation
    pub start: Instant,
    /// Wall-clock start (Unix ms) for logs and snapshots
    pub started_at_ms: u64,
    /// Total cost across all iterations, monotonically non-decreasing
    pub cumulative_cost: f64,
    /// Total tokens across all iterations
    pub cumulative_tokens: u64,
    /// Failures since the last successful iteration
    pub consecutive_failures: u32,
    /// Successful iterations in a row that made no progress
    pub consecutive_no_progress: u32,
    /// Consecutive explicit completion confirmations
    pub completion_confirmations: u32,
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopState {
    /// Create fresh state with all counters at zero
    pub fn new() -> Self {
        Self {
            iteration: 0,
            start: Instant::now(),
            started_at_ms: now_ms(),
            cumulative_cost: 0.0,
            cumulative_tokens: 0,
            consecutive_failures: 0,
            consecutive_no_progress: 0,
            completion_confirmations: 0,
        }
    }

    /// Time since the run started, including any paused interval
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Apply one iteration's signal. This is the single mutation point.
    ///
    /// A system-error signal still counts the iteration and its cost, but
    /// leaves the failure and confirmation counters untouched so failure
    /// statistics stay meaningful for diagnosis.
    pub fn apply(&mut self, signal: &IterationSignal) {
        self.iteration += 1;
        // Negative deltas are clamped: cumulative_cost never decreases.
        self.cumulative_cost += signal.cost_delta.max(0.0);
        self.cumulative_tokens += signal.token_delta;

        if signal.system_error.is_some() {
            return;
        }

        if signal.success {
            self.consecutive_failures = 0;
            if signal.made_progress {
                self.consecutive_no_progress = 0;
            } else {
                self.consecutive_no_progress += 1;
            }
        } else {
            self.consecutive_failures += 1;
        }

        if signal.completed {
            self.completion_confirmations += 1;
        } else {
            self.completion_confirmations = 0;
        }
    }

    /// Serializable snapshot for the task log and terminal reporting
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            iteration: self.iteration,
            started_at_ms: self.started_at_ms,
            elapsed_ms: self.elapsed().as_millis() as u64,
            cumulative_cost: self.cumulative_cost,
            cumulative_tokens: self.cumulative_tokens,
            consecutive_failures: self.consecutive_failures,
            consecutive_no_progress: self.consecutive_no_progress,
            completion_confirmations: self.completion_confirmations,
        }
    }
}

/// Point-in-time view of LoopState, safe to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub iteration: u32,
    pub started_at_ms: u64,
    pub elapsed_ms: u64,
    pub cumulative_cost: f64,
    pub cumulative_tokens: u64,
    pub consecutive_failures: u32,
    pub consecutive_no_progress: u32,
    pub completion_confirmations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_zeroed() {
        let state = LoopState::new();
        assert_eq!(state.iteration, 0);
        assert_eq!(state.cumulative_cost, 0.0);
        assert_eq!(state.cumulative_tokens, 0);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.consecutive_no_progress, 0);
        assert_eq!(state.completion_confirmations, 0);
    }

    #[test]
    fn test_elapsed_is_non_negative() {
        let state = LoopState::new();
        assert!(state.elapsed() >= Duration::ZERO);
    }

    #[test]
    fn test_apply_success_increments_iteration() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success());
        assert_eq!(state.iteration, 1);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_apply_accumulates_cost_and_tokens() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success().with_cost(1.5).with_tokens(100));
        state.apply(&IterationSignal::success().with_cost(2.5).with_tokens(200));
        assert_eq!(state.cumulative_cost, 4.0);
        assert_eq!(state.cumulative_tokens, 300);
    }

    #[test]
    fn test_negative_cost_delta_is_clamped() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success().with_cost(3.0));
        state.apply(&IterationSignal::success().with_cost(-1.0));
        assert_eq!(state.cumulative_cost, 3.0);
    }

    #[test]
    fn test_failure_increments_and_success_resets() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::failure("a"));
        state.apply(&IterationSignal::failure("b"));
        assert_eq!(state.consecutive_failures, 2);
        state.apply(&IterationSignal::success());
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_no_progress_streak() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success().without_progress());
        state.apply(&IterationSignal::success().without_progress());
        assert_eq!(state.consecutive_no_progress, 2);
        state.apply(&IterationSignal::success());
        assert_eq!(state.consecutive_no_progress, 0);
    }

    #[test]
    fn test_failure_does_not_touch_no_progress_streak() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success().without_progress());
        state.apply(&IterationSignal::failure("x"));
        assert_eq!(state.consecutive_no_progress, 1);
    }

    #[test]
    fn test_completion_confirmations_reset_on_non_completion() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success().completed());
        state.apply(&IterationSignal::success().completed());
        assert_eq!(state.completion_confirmations, 2);
        state.apply(&IterationSignal::success());
        assert_eq!(state.completion_confirmations, 0);
    }

    #[test]
    fn test_system_error_bypasses_failure_counters() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::failure("a"));
        state.apply(&IterationSignal::system_error("disk full").with_cost(0.5));
        assert_eq!(state.iteration, 2);
        assert_eq!(state.cumulative_cost, 0.5);
        // Failure counter untouched by the system error
        assert_eq!(state.consecutive_failures, 1);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let mut state = LoopState::new();
        state.apply(&IterationSignal::success().with_cost(1.0).with_tokens(50).completed());
        let snap = state.snapshot();
        assert_eq!(snap.iteration, 1);
        assert_eq!(snap.cumulative_cost, 1.0);
        assert_eq!(snap.cumulative_tokens, 50);
        assert_eq!(snap.completion_confirmations, 1);
    }

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let state = LoopState::new();
        let snap = state.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.iteration, snap.iteration);
        assert_eq!(parsed.started_at_ms, snap.started_at_ms);
    }
}
