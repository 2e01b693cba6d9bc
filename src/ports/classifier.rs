//! Classifier port: Trait for the pre-trained risk model.
//!
//! This trait abstracts the model artifact (logistic export, dense network)
//! from the application logic.

use super::InferenceError;

/// Trait for scoring an assembled feature vector.
///
/// Implementations are pure functions of their input: no state changes
/// between calls, same input gives the same probability.
pub trait Classifier: Send + Sync {
    /// Input column names the model was trained on, in order.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive (diabetic) class.
    ///
    /// # Errors
    /// Returns `InferenceError` if the input width does not match the model
    /// or evaluation produces a non-finite value.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, InferenceError>;
}
