//! Domain types for looprun
//!
//! This module contains the core domain types:
//! - LoopStatus: the lifecycle state machine values
//! - IterationSignal: per-iteration outcome produced by the executor

pub mod signal;
pub mod status;

pub use signal::IterationSignal;
pub use status::LoopStatus;
