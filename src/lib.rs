//! looprun - an autonomous iteration controller
//!
//! A loop run drives an external executor iteration by iteration until a
//! stop condition fires. Stop conditions live in fixed priority bands and
//! are arbitrated by a composite detector; run state is persisted to an
//! append-only JSONL task log; workspace exclusivity is enforced with a
//! PID-stamped lock file.

pub mod context;
pub mod criteria;
pub mod domain;
pub mod error;
pub mod id;
pub mod lock;
pub mod runner;
pub mod state;
pub mod stop;
pub mod tasklog;

pub use context::LoopContext;
pub use criteria::{CompletionCriteria, StopIntent, StopPredicate};
pub use domain::{IterationSignal, LoopStatus};
pub use error::{LooprunError, Result};
pub use lock::{LockInfo, WorkspaceLock};
pub use runner::{CommandExecutor, ControlHandle, IterationExecutor, LoopController, MockExecutor, RunOutcome};
pub use state::{LoopState, StateSnapshot};
pub use stop::{CompositeStopDetector, StopKind, StopResult};
pub use tasklog::{TaskLog, TaskLogRecord};
