//! Stop-condition variants
//!
//! Each variant is a pure function of (LoopState, CompletionCriteria,
//! IterationSignal). A variant either produces a StopResult naming the
//! condition, its measured value versus threshold, and the target terminal
//! status, or it passes. Numeric thresholds of 0 disable the check.

use serde::{Deserialize, Serialize};

use crate::criteria::{CompletionCriteria, StopIntent};
use crate::domain::{IterationSignal, LoopStatus};
use crate::state::LoopState;

/// Which condition fired. Finer-grained than the variant list so reason
/// strings and telemetry can distinguish sibling checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    SystemError,
    UserInterrupt,
    ConsecutiveFailures,
    NoProgress,
    Completion,
    MaxIterations,
    Timeout,
    MaxCost,
    MaxTokens,
    Custom,
}

/// The arbitration verdict: which condition fired and what it means
#[derive(Debug, Clone, PartialEq)]
pub struct StopResult {
    /// Condition that triggered
    pub kind: StopKind,
    /// Priority band the condition belongs to (lower wins)
    pub priority: u8,
    /// Human-readable reason naming measured value versus threshold
    pub message: String,
    /// Terminal status the controller must transition to
    pub status: LoopStatus,
}

impl StopResult {
    fn new(kind: StopKind, priority: u8, message: String, status: LoopStatus) -> Self {
        Self {
            kind,
            priority,
            message,
            status,
        }
    }
}

/// The stop-condition variant family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Unrecoverable system-level error reported by the executor
    SystemError,
    /// External interrupt observed at the iteration boundary
    UserInterrupt,
    /// Failure accumulation: hard-failure streak and no-progress streak
    ConsecutiveFailures,
    /// Enough consecutive explicit completion confirmations
    Completion,
    /// Iteration budget exhausted
    MaxIterations,
    /// Wall-clock budget exhausted (pause time included)
    Timeout,
    /// Cost or token budget exhausted
    MaxCost,
    /// Caller-supplied predicate
    Custom,
}

impl StopCondition {
    /// Evaluate this condition. `priority` is the band the detector placed
    /// it in; it is carried into the StopResult unchanged.
    pub fn evaluate(
        &self,
        priority: u8,
        state: &LoopState,
        criteria: &CompletionCriteria,
        signal: &IterationSignal,
    ) -> Option<StopResult> {
        match self {
            StopCondition::SystemError => signal.system_error.as_ref().map(|e| {
                StopResult::new(
                    StopKind::SystemError,
                    priority,
                    format!("system error: {}", e),
                    LoopStatus::Failed,
                )
            }),

            StopCondition::UserInterrupt => signal.interrupt.as_ref().map(|reason| {
                StopResult::new(
                    StopKind::UserInterrupt,
                    priority,
                    format!("interrupted: {}", reason),
                    LoopStatus::Terminated,
                )
            }),

            StopCondition::ConsecutiveFailures => {
                if criteria.max_consecutive_failures > 0
                    && state.consecutive_failures >= criteria.max_consecutive_failures
                {
                    return Some(StopResult::new(
                        StopKind::ConsecutiveFailures,
                        priority,
                        format!(
                            "consecutive_failures {} >= max_consecutive_failures {}",
                            state.consecutive_failures, criteria.max_consecutive_failures
                        ),
                        LoopStatus::Failed,
                    ));
                }
                if criteria.max_endless > 0 && state.consecutive_no_progress >= criteria.max_endless {
                    return Some(StopResult::new(
                        StopKind::NoProgress,
                        priority,
                        format!(
                            "consecutive_no_progress {} >= max_endless {}",
                            state.consecutive_no_progress, criteria.max_endless
                        ),
                        LoopStatus::Failed,
                    ));
                }
                None
            }

            StopCondition::Completion => {
                if state.completion_confirmations >= criteria.required_confirmations {
                    Some(StopResult::new(
                        StopKind::Completion,
                        priority,
                        format!(
                            "completion confirmed {} time(s) (required {})",
                            state.completion_confirmations, criteria.required_confirmations
                        ),
                        LoopStatus::Completed,
                    ))
                } else {
                    None
                }
            }

            StopCondition::MaxIterations => {
                if criteria.max_iterations > 0 && state.iteration >= criteria.max_iterations {
                    Some(StopResult::new(
                        StopKind::MaxIterations,
                        priority,
                        format!(
                            "iteration {} >= max_iterations {}",
                            state.iteration, criteria.max_iterations
                        ),
                        LoopStatus::Failed,
                    ))
                } else {
                    None
                }
            }

            StopCondition::Timeout => {
                if criteria.timeout > std::time::Duration::ZERO && state.elapsed() >= criteria.timeout {
                    Some(StopResult::new(
                        StopKind::Timeout,
                        priority,
                        format!(
                            "elapsed {:.1}s >= timeout {:.1}s",
                            state.elapsed().as_secs_f64(),
                            criteria.timeout.as_secs_f64()
                        ),
                        LoopStatus::Failed,
                    ))
                } else {
                    None
                }
            }

            StopCondition::MaxCost => {
                if criteria.max_cost > 0.0 && state.cumulative_cost >= criteria.max_cost {
                    return Some(StopResult::new(
                        StopKind::MaxCost,
                        priority,
                        format!(
                            "cumulative_cost {} >= max_cost {}",
                            state.cumulative_cost, criteria.max_cost
                        ),
                        LoopStatus::Failed,
                    ));
                }
                if criteria.max_tokens > 0 && state.cumulative_tokens >= criteria.max_tokens {
                    return Some(StopResult::new(
                        StopKind::MaxTokens,
                        priority,
                        format!(
                            "cumulative_tokens {} >= max_tokens {}",
                            state.cumulative_tokens, criteria.max_tokens
                        ),
                        LoopStatus::Failed,
                    ));
                }
                None
            }

            StopCondition::Custom => {
                let predicate = criteria.custom_stop.as_ref()?;
                if predicate.check(state, criteria, signal) {
                    let status = match predicate.intent() {
                        StopIntent::Complete => LoopStatus::Completed,
                        StopIntent::Fail => LoopStatus::Failed,
                    };
                    Some(StopResult::new(
                        StopKind::Custom,
                        priority,
                        format!("custom stop '{}' triggered", predicate.name()),
                        status,
                    ))
                } else {
                    None
                }
            }
        }
    }
}
