//! Completion criteria: the immutable stop thresholds for a run
//!
//! A value of 0 for any numeric threshold means "unlimited" and the
//! corresponding check is skipped. This is a deliberate disable sentinel,
//! not an error, and must be preserved exactly.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::IterationSignal;
use crate::error::{LooprunError, Result};
use crate::state::LoopState;

/// Declared intent of a caller-supplied stop predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopIntent {
    /// The predicate detects successful completion
    Complete,
    /// The predicate detects an unrecoverable condition
    Fail,
}

/// Caller-supplied stop predicate, evaluated last among the limit checks
pub trait StopPredicate: Send + Sync {
    /// Name used in the terminal reason string
    fn name(&self) -> &str;

    /// Whether a trigger means Completed or Failed
    fn intent(&self) -> StopIntent;

    /// Return true if the loop should stop. `criteria.answer` is available
    /// for expected-answer comparisons against the signal payload.
    fn check(&self, state: &LoopState, criteria: &CompletionCriteria, signal: &IterationSignal) -> bool;
}

/// Immutable configuration of stop thresholds, created once at loop start
#[derive(Clone)]
pub struct CompletionCriteria {
    /// Maximum iterations before giving up (0 = unlimited)
    pub max_iterations: u32,
    /// Wall-clock budget, pause time included (zero = unlimited)
    pub timeout: Duration,
    /// Token budget (0 = unlimited)
    pub max_tokens: u64,
    /// Cost budget (0 = unlimited)
    pub max_cost: f64,
    /// Cap on consecutive no-progress iterations, distinct from hard
    /// failures (0 = unlimited)
    pub max_endless: u32,
    /// Cap on consecutive failed iterations (0 = unlimited)
    pub max_consecutive_failures: u32,
    /// Consecutive explicit "done" signals required before completion is
    /// trusted (must be >= 1)
    pub required_confirmations: u32,
    /// Expected answer, consulted only by custom stop predicates
    pub answer: Option<Value>,
    /// Caller-supplied predicate, evaluated last among limit checks
    pub custom_stop: Option<Arc<dyn StopPredicate>>,
}

impl Default for CompletionCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            timeout: Duration::ZERO,
            max_tokens: 0,
            max_cost: 0.0,
            max_endless: 0,
            max_consecutive_failures: 0,
            required_confirmations: 1,
            answer: None,
            custom_stop: None,
        }
    }
}

impl std::fmt::Debug for CompletionCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCriteria")
            .field("max_iterations", &self.max_iterations)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("max_cost", &self.max_cost)
            .field("max_endless", &self.max_endless)
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .field("required_confirmations", &self.required_confirmations)
            .field("answer", &self.answer)
            .field("custom_stop", &self.custom_stop.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl CompletionCriteria {
    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the wall-clock budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the token budget
    pub fn with_max_tokens(mut self, max: u64) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the cost budget
    pub fn with_max_cost(mut self, max: f64) -> Self {
        self.max_cost = max;
        self
    }

    /// Set the no-progress cap
    pub fn with_max_endless(mut self, max: u32) -> Self {
        self.max_endless = max;
        self
    }

    /// Set the consecutive-failure cap
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Set the completion confirmation threshold
    pub fn with_required_confirmations(mut self, count: u32) -> Self {
        self.required_confirmations = count;
        self
    }

    /// Set the expected answer for custom checks
    pub fn with_answer(mut self, answer: Value) -> Self {
        self.answer = Some(answer);
        self
    }

    /// Install a custom stop predicate
    pub fn with_custom_stop(mut self, predicate: Arc<dyn StopPredicate>) -> Self {
        self.custom_stop = Some(predicate);
        self
    }

    /// Validate the criteria. Called at INIT, before RUNNING.
    pub fn validate(&self) -> Result<()> {
        if !self.max_cost.is_finite() {
            return Err(LooprunError::Config("max_cost must be finite".to_string()));
        }
        if self.max_cost < 0.0 {
            return Err(LooprunError::Config(format!(
                "max_cost must be >= 0, got {}",
                self.max_cost
            )));
        }
        if self.required_confirmations == 0 {
            return Err(LooprunError::Config(
                "required_confirmations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
