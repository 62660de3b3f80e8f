//! Composite stop-condition arbitration
//!
//! Conditions live in fixed priority bands and are evaluated in band order
//! with short-circuiting: the first condition that fires wins, so a system
//! error always beats a user interrupt, which beats failure accumulation,
//! which beats completion, which beats resource limits. The band table is
//! static and immutable; there is no registration API.

use log::debug;

use crate::criteria::CompletionCriteria;
use crate::domain::IterationSignal;
use crate::state::LoopState;
use crate::stop::conditions::{StopCondition, StopResult};

/// Priority bands, lowest number wins. Order within a band is the order
/// conditions are checked when the band is reached.
const PRIORITY_BANDS: &[(u8, &[StopCondition])] = &[
    (0, &[StopCondition::SystemError]),
    (1, &[StopCondition::UserInterrupt]),
    (2, &[StopCondition::ConsecutiveFailures]),
    (3, &[StopCondition::Completion]),
    (
        4,
        &[
            StopCondition::MaxIterations,
            StopCondition::Timeout,
            StopCondition::MaxCost,
            StopCondition::Custom,
        ],
    ),
];

/// Evaluates the full condition set against one iteration's outcome
#[derive(Debug, Default)]
pub struct CompositeStopDetector;

impl CompositeStopDetector {
    pub fn new() -> Self {
        Self
    }

    /// Run the arbitration. Returns the highest-priority condition that
    /// fired, or None when the loop should continue. Evaluation is pure:
    /// calling it twice with the same inputs yields the same verdict.
    pub fn evaluate(
        &self,
        state: &LoopState,
        criteria: &CompletionCriteria,
        signal: &IterationSignal,
    ) -> Option<StopResult> {
        for (priority, conditions) in PRIORITY_BANDS {
            for condition in *conditions {
                if let Some(result) = condition.evaluate(*priority, state, criteria, signal) {
                    debug!(
                        "stop condition fired: {:?} (priority {}): {}",
                        result.kind, result.priority, result.message
                    );
                    return Some(result);
                }
            }
        }
        None
    }
}
