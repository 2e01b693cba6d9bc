//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the pipeline and the pre-fitted artifacts it consumes.

mod classifier;
mod scaler;

pub use classifier::Classifier;
pub use scaler::Scaler;

/// Errors raised by, or detected around, an external artifact call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Input width mismatch: expected {expected}, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    #[error("Output width mismatch: expected {expected}, got {actual}")]
    OutputWidth { expected: usize, actual: usize },

    #[error("Non-finite value at output position {0}")]
    NonFinite(usize),

    #[error("Probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f64),

    #[error("Model evaluation failed: {0}")]
    Evaluation(String),
}
