//! Adapters layer: Concrete implementations of ports.
//!
//! These modules turn exported training artifacts into working components:
//! - `bundle`: manifest, hash and signature verification plus loading
//! - `scaler`: standard scaler from exported statistics
//! - `classifier`: logistic or dense network from exported weights
//! - `sanitize`: clinical-value filtering for logs

pub mod bundle;
pub mod classifier;
pub mod sanitize;
pub mod scaler;

pub use bundle::{ArtifactBundle, ArtifactError, ArtifactStatus, BundleLoadError, BundleOptions};
pub use classifier::ModelClassifier;
pub use scaler::StandardScaler;
