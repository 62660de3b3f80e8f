//! Loop lifecycle controller
//!
//! LoopController owns the run from INIT through a terminal status. The
//! cycle is strict: boundary checks (interrupt, pause), execute, apply the
//! signal to state, persist the iteration record, arbitrate stop
//! conditions. Status only moves forward (INIT -> RUNNING -> PAUSED* ->
//! terminal) and the workspace lock is released exactly once, at the
//! terminal transition.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::context::LoopContext;
use crate::criteria::CompletionCriteria;
use crate::domain::{IterationSignal, LoopStatus};
use crate::error::{LooprunError, Result};
use crate::lock::WorkspaceLock;
use crate::runner::control::ControlHandle;
use crate::runner::executor::IterationExecutor;
use crate::state::{LoopState, StateSnapshot};
use crate::stop::{CompositeStopDetector, StopKind, StopResult};
use crate::tasklog::{TaskLog, TaskLogRecord};

/// How often a paused loop re-checks its control handle
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Terminal summary of one run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: LoopStatus,
    pub stop_kind: StopKind,
    pub reason: String,
    pub snapshot: StateSnapshot,
}

/// Drives one loop run to a terminal status
pub struct LoopController {
    context: LoopContext,
    criteria: CompletionCriteria,
    executor: Arc<dyn IterationExecutor>,
    detector: CompositeStopDetector,
    control: ControlHandle,
    status: LoopStatus,
    pause_poll: Duration,
}

impl std::fmt::Debug for LoopController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopController")
            .field("context", &self.context)
            .field("criteria", &self.criteria)
            .field("detector", &self.detector)
            .field("control", &self.control)
            .field("status", &self.status)
            .field("pause_poll", &self.pause_poll)
            .finish_non_exhaustive()
    }
}

impl LoopController {
    /// Create a controller in INIT. Criteria are validated here, before any
    /// side effects.
    pub fn new(
        context: LoopContext,
        criteria: CompletionCriteria,
        executor: Arc<dyn IterationExecutor>,
    ) -> Result<Self> {
        criteria.validate()?;
        Ok(Self {
            context,
            criteria,
            executor,
            detector: CompositeStopDetector::new(),
            control: ControlHandle::new(),
            status: LoopStatus::Init,
            pause_poll: PAUSE_POLL,
        })
    }

    /// Handle for steering this run from other threads
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn status(&self) -> LoopStatus {
        self.status
    }

    pub fn context(&self) -> &LoopContext {
        &self.context
    }

    #[cfg(test)]
    pub(crate) fn with_pause_poll(mut self, poll: Duration) -> Self {
        self.pause_poll = poll;
        self
    }

    /// Run the loop to a terminal status. Consumes the INIT state: a
    /// controller runs at most once.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        if self.status != LoopStatus::Init {
            return Err(LooprunError::InvalidState(format!(
                "cannot run a loop in status {}",
                self.status
            )));
        }

        self.context.ensure_dirs()?;
        // A flag left over from an earlier run must not kill this one
        self.context.clear_stop_flag()?;

        let mut lock = WorkspaceLock::acquire(&self.context.lock_path())?;
        self.context.is_primary = true;
        self.status = LoopStatus::Running;
        info!("loop {} running in {}", self.context.id, self.context.workspace.display());

        let log = TaskLog::open(self.context.task_log_path())?;
        let mut state = LoopState::new();

        let verdict = loop {
            if let Some(verdict) = self.boundary(&state).await {
                break verdict;
            }

            let signal = match self.executor.execute(&state).await {
                Ok(signal) => signal,
                // Executor failures are recoverable and feed the streak;
                // anything else is a system error and ends the run.
                Err(LooprunError::Executor(reason)) => IterationSignal::failure(reason),
                Err(e) => IterationSignal::system_error(e.to_string()),
            };

            state.apply(&signal);
            log.append(&TaskLogRecord::iteration(&self.context.id, &signal, state.snapshot()))?;

            if let Some(verdict) = self.detector.evaluate(&state, &self.criteria, &signal) {
                break verdict;
            }
        };

        self.finish(verdict, &state, &log, &mut lock)
    }

    /// Iteration-boundary checks: interrupts first, then pause. Returns a
    /// verdict when the loop must not start another iteration.
    async fn boundary(&mut self, state: &LoopState) -> Option<StopResult> {
        loop {
            if let Some(reason) = self.take_interrupt() {
                let probe = IterationSignal::boundary().with_interrupt(reason);
                return self.detector.evaluate(state, &self.criteria, &probe);
            }

            if self.control.pause_requested() {
                if self.status == LoopStatus::Running {
                    self.status = LoopStatus::Paused;
                    info!("loop {} paused", self.context.id);
                }
                // The wall clock keeps running while paused
                tokio::time::sleep(self.pause_poll).await;
                continue;
            }

            if self.status == LoopStatus::Paused {
                self.status = LoopStatus::Running;
                info!("loop {} resumed", self.context.id);
            }

            // Budgets may have expired while paused or since the last apply
            let probe = IterationSignal::boundary();
            return self.detector.evaluate(state, &self.criteria, &probe);
        }
    }

    /// Drain a pending interrupt from the control handle or the stop flag
    /// file. The flag is removed once observed so it cannot re-fire.
    fn take_interrupt(&self) -> Option<String> {
        if let Some(reason) = self.control.stop_requested() {
            return Some(reason);
        }
        let reason = self.context.read_stop_flag()?;
        if let Err(e) = self.context.clear_stop_flag() {
            warn!("failed to clear stop flag: {}", e);
        }
        Some(reason)
    }

    /// Terminal transition: record the final status, then release the lock.
    fn finish(
        &mut self,
        verdict: StopResult,
        state: &LoopState,
        log: &TaskLog,
        lock: &mut WorkspaceLock,
    ) -> Result<RunOutcome> {
        self.status = verdict.status;
        info!(
            "loop {} finished: {} ({}) after {} iteration(s)",
            self.context.id, verdict.status, verdict.message, state.iteration
        );

        log.append(&TaskLogRecord::terminal(
            &self.context.id,
            verdict.status,
            verdict.kind,
            &verdict.message,
            state.snapshot(),
        ))?;

        lock.release()?;
        self.context.is_primary = false;

        Ok(RunOutcome {
            run_id: self.context.id.clone(),
            status: verdict.status,
            stop_kind: verdict.kind,
            reason: verdict.message,
            snapshot: state.snapshot(),
        })
    }
}
