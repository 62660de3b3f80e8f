//! Per-iteration execution signal
//!
//! The external iteration executor produces one IterationSignal per cycle.
//! The controller consumes it exactly once: it is applied to LoopState and
//! then handed to the stop detector.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one external iteration, as reported by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationSignal {
    /// Whether the iteration succeeded
    pub success: bool,
    /// Failure detail when `success` is false
    pub failure_reason: Option<String>,
    /// Cost incurred by this iteration (currency units)
    pub cost_delta: f64,
    /// Tokens consumed by this iteration
    pub token_delta: u64,
    /// Whether the iteration moved the task forward (feeds the endless guard)
    pub made_progress: bool,
    /// Explicit "done" confirmation from the agent
    pub completed: bool,
    /// Opaque payload for caller-supplied stop predicates
    pub payload: Option<Value>,
    /// Unrecoverable system-level error (terminal, bypasses failure counters)
    pub system_error: Option<String>,
    /// Interrupt reason recorded by the controller at the iteration boundary
    pub interrupt: Option<String>,
}

impl IterationSignal {
    /// A successful iteration that made progress
    pub fn success() -> Self {
        Self {
            success: true,
            failure_reason: None,
            cost_delta: 0.0,
            token_delta: 0,
            made_progress: true,
            completed: false,
            payload: None,
            system_error: None,
            interrupt: None,
        }
    }

    /// A failed iteration with the given reason
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_reason: Some(reason.into()),
            made_progress: false,
            ..Self::success()
        }
    }

    /// An unrecoverable system-level error
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            made_progress: false,
            system_error: Some(message.into()),
            ..Self::success()
        }
    }

    /// A neutral probe evaluated at iteration boundaries (pause/resume,
    /// interrupt checks). Never applied to LoopState.
    pub fn boundary() -> Self {
        Self::success()
    }

    /// Set the cost incurred by this iteration
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_delta = cost;
        self
    }

    /// Set the tokens consumed by this iteration
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.token_delta = tokens;
        self
    }

    /// Mark this iteration as an explicit completion confirmation
    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Mark this iteration as having made no forward progress
    pub fn without_progress(mut self) -> Self {
        self.made_progress = false;
        self
    }

    /// Attach a payload for custom stop predicates
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Record an interrupt observed at the iteration boundary
    pub fn with_interrupt(mut self, reason: impl Into<String>) -> Self {
        self.interrupt = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_signal() {
        let signal = IterationSignal::success();
        assert!(signal.success);
        assert!(signal.made_progress);
        assert!(!signal.completed);
        assert!(signal.failure_reason.is_none());
        assert!(signal.system_error.is_none());
        assert_eq!(signal.cost_delta, 0.0);
        assert_eq!(signal.token_delta, 0);
    }

    #[test]
    fn test_failure_signal() {
        let signal = IterationSignal::failure("validation exited 1");
        assert!(!signal.success);
        assert!(!signal.made_progress);
        assert_eq!(signal.failure_reason.as_deref(), Some("validation exited 1"));
        assert!(signal.system_error.is_none());
    }

    #[test]
    fn test_system_error_signal() {
        let signal = IterationSignal::system_error("out of disk");
        assert!(!signal.success);
        assert_eq!(signal.system_error.as_deref(), Some("out of disk"));
    }

    #[test]
    fn test_builder_cost_and_tokens() {
        let signal = IterationSignal::success().with_cost(0.25).with_tokens(1200);
        assert_eq!(signal.cost_delta, 0.25);
        assert_eq!(signal.token_delta, 1200);
    }

    #[test]
    fn test_builder_completed() {
        let signal = IterationSignal::success().completed();
        assert!(signal.completed);
    }

    #[test]
    fn test_builder_without_progress() {
        let signal = IterationSignal::success().without_progress();
        assert!(signal.success);
        assert!(!signal.made_progress);
    }

    #[test]
    fn test_builder_payload() {
        let signal = IterationSignal::success().with_payload(json!({"answer": 42}));
        assert_eq!(signal.payload.unwrap()["answer"], 42);
    }

    #[test]
    fn test_builder_interrupt() {
        let signal = IterationSignal::boundary().with_interrupt("stop requested");
        assert_eq!(signal.interrupt.as_deref(), Some("stop requested"));
    }

    #[test]
    fn test_signal_serialization_roundtrip() {
        let signal = IterationSignal::success()
            .with_cost(1.5)
            .with_tokens(300)
            .completed();
        let json = serde_json::to_string(&signal).unwrap();
        let parsed: IterationSignal = serde_json::from_str(&json).unwrap();
        assert!(parsed.success);
        assert!(parsed.completed);
        assert_eq!(parsed.cost_delta, 1.5);
        assert_eq!(parsed.token_delta, 300);
    }
}
