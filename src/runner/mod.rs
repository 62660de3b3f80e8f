//! Loop execution: the controller, its control surface, and executors

pub mod control;
pub mod controller;
pub mod executor;

pub use control::ControlHandle;
pub use controller::{LoopController, RunOutcome};
pub use executor::{CommandExecutor, IterationExecutor, MockExecutor};
