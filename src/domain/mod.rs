//! Domain layer: Core business types and logic.
//!
//! Pure, synchronous preprocessing and decision logic with no I/O. Every
//! type here is either a per-request value or an immutable parameter set.

mod features;
mod imputer;
mod params;
mod power;
mod prediction;
mod record;

pub use features::{FeatureAssembler, FeatureVector, FEATURE_COUNT, FEATURE_ORDER};
pub use imputer::{Imputer, MissingnessFlags, MISSINGNESS_FIELDS};
pub use params::{ImputationMedians, PowerLambdas, TransformParameters};
pub use power::{box_cox, yeo_johnson, DomainError, PowerTransformer, BOX_COX_FIELDS, YEO_JOHNSON_FIELDS};
pub use prediction::{Outcome, PredictionResponse, PredictionResult, DECISION_THRESHOLD};
pub use record::{
    ClinicalField, ClinicalValues, FeatureRecord, FieldRange, FieldViolation, ValidationError,
    CLINICAL_FIELD_COUNT,
};

#[cfg(test)]
pub(crate) mod fixtures {
    pub(crate) use super::params::tests::shipped_params;
    pub(crate) use super::record::tests::pima_first_row;
}
