//! Stop-condition arbitration: the variants and the composite detector

pub mod conditions;
pub mod detector;

pub use conditions::{StopCondition, StopKind, StopResult};
pub use detector::CompositeStopDetector;
