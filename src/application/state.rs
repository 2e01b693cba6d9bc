//! Service lifecycle: Ready or degraded, decided once at startup.

use serde::Serialize;

use crate::adapters::{ArtifactBundle, ArtifactStatus, BundleLoadError};
use crate::domain::{FeatureRecord, PredictionResult};
use crate::{GlucoguardError, Result};

use super::PredictionService;

const RUNNING_MESSAGE: &str = "Diabetes Prediction API is running";
const DEGRADED_MESSAGE: &str = "Diabetes Prediction API is running without a usable model";

/// Health check payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub message: String,
    pub model_loaded: bool,
    pub scaler_loaded: bool,
    pub params_loaded: bool,
    pub bundle_version: Option<String>,
    /// Version of the transform parameters feeding the pipeline.
    pub params_version: Option<String>,
}

/// Whether the service can answer predictions.
///
/// Built once from the bundle load result. An unavailable state stays
/// unavailable; nothing here retries the load.
pub enum ServiceState {
    Ready {
        service: PredictionService,
        bundle_version: String,
    },
    Unavailable {
        reason: String,
        status: ArtifactStatus,
    },
}

impl ServiceState {
    /// Build the state from a bundle load, logging a failure exactly once.
    #[must_use]
    pub fn from_load(loaded: std::result::Result<ArtifactBundle, BundleLoadError>) -> Self {
        match loaded {
            Ok(bundle) => {
                let service = PredictionService::new(
                    bundle.scaler_port(),
                    bundle.classifier_port(),
                    bundle.params.clone(),
                );
                Self::Ready {
                    service,
                    bundle_version: bundle.manifest.bundle_version,
                }
            }
            Err(err) => {
                tracing::error!("Artifact bundle unavailable: {}", err);
                Self::Unavailable {
                    reason: err.to_string(),
                    status: err.status,
                }
            }
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Predict if ready.
    ///
    /// # Errors
    /// Returns `GlucoguardError::Unavailable` in degraded mode, otherwise
    /// whatever the pipeline returns.
    pub fn predict(&self, record: &FeatureRecord) -> Result<PredictionResult> {
        match self {
            Self::Ready { service, .. } => service.predict(record),
            Self::Unavailable { reason, .. } => Err(GlucoguardError::Unavailable(reason.clone())),
        }
    }

    #[must_use]
    pub fn health(&self) -> HealthReport {
        match self {
            Self::Ready {
                service,
                bundle_version,
            } => HealthReport {
                message: RUNNING_MESSAGE.to_string(),
                model_loaded: true,
                scaler_loaded: true,
                params_loaded: true,
                bundle_version: Some(bundle_version.clone()),
                params_version: Some(service.params_version().to_string()),
            },
            Self::Unavailable { status, .. } => HealthReport {
                message: DEGRADED_MESSAGE.to_string(),
                model_loaded: status.model_loaded,
                scaler_loaded: status.scaler_loaded,
                params_loaded: status.params_loaded,
                bundle_version: None,
                params_version: None,
            },
        }
    }
}
