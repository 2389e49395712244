//! Stage-to-pipeline event correlation.

pub mod builder;
mod engine;
pub mod estimator;
mod position;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{classify, EventCorrelationEngine, Transition};
pub use estimator::{estimate_duration, DEFAULT_SAMPLES};
pub use position::{is_first_stage, is_last_stage, StagePosition};
