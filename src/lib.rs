//! # Glucoguard
//!
//! Diabetes risk prediction from eight clinical measurements.
//!
//! This crate provides:
//! - Validation of raw clinical records
//! - The frozen preprocessing pipeline (imputation, power transforms, scaling)
//! - Inference against a verified artifact bundle
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Records, preprocessing math and the decision rule
//! - `ports`: Trait definitions for the pre-fitted scaler and classifier
//! - `adapters`: Artifact bundle loading, concrete scaler/classifier, log sanitizing
//! - `application`: Prediction use case and service lifecycle
//! - `config`: Environment-driven service configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

use serde::Serialize;

pub use domain::{FeatureRecord, PredictionResponse, PredictionResult};

/// Result type for Glucoguard operations
pub type Result<T> = std::result::Result<T, GlucoguardError>;

/// Main error type for Glucoguard
#[derive(Debug, thiserror::Error)]
pub enum GlucoguardError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Invalid record: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Numeric domain error: {0}")]
    NumericDomain(#[from] domain::DomainError),

    #[error("Inference failed: {0}")]
    Inference(#[from] ports::InferenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    Validation,
    NumericDomain,
    Inference,
    Internal,
}

impl GlucoguardError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) | Self::Artifact(_) => ErrorKind::Unavailable,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NumericDomain(_) => ErrorKind::NumericDomain,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Detail safe to return to a caller.
    ///
    /// Inference failures are reported generically; their specifics only go
    /// to the log.
    #[must_use]
    pub fn public_detail(&self) -> String {
        match self {
            Self::Unavailable(_) | Self::Artifact(_) => {
                "model artifacts are not loaded; contact the operator".to_string()
            }
            Self::Validation(e) => e.to_string(),
            Self::NumericDomain(e) => e.to_string(),
            Self::Inference(_) => "prediction failed".to_string(),
            Self::Serialization(e) => e.to_string(),
        }
    }

    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.kind(),
            detail: self.public_detail(),
        }
    }
}

/// Error body returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub detail: String,
}
