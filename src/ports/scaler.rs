//! Scaler port: Trait for the pre-fitted feature standardizer.
//!
//! This trait abstracts the scaler artifact from the application logic.

use super::InferenceError;

/// Trait for standardizing the eight clinical values.
///
/// Implementations hold training-time statistics and are never re-fitted.
/// They must be safe to call concurrently from several threads.
pub trait Scaler: Send + Sync {
    /// Column names the scaler was fitted on, in order.
    fn feature_names(&self) -> &[String];

    /// Standardize one row of clinical values.
    ///
    /// # Arguments
    /// * `clinical` - Power-transformed values in training column order
    ///
    /// # Errors
    /// Returns `InferenceError` if the row has the wrong width or the
    /// result is not finite.
    fn transform(&self, clinical: &[f64]) -> Result<Vec<f64>, InferenceError>;
}
