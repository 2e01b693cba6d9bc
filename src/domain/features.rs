//! Model input assembly.
//!
//! The classifier binds inputs by position only, so [`FEATURE_ORDER`] is the
//! single source of truth for what each slot means.

use std::ops::Index;

use super::imputer::{MissingnessFlags, MISSINGNESS_FIELDS};
use super::record::{ClinicalValues, CLINICAL_FIELD_COUNT};

/// Width of the model input.
pub const FEATURE_COUNT: usize = CLINICAL_FIELD_COUNT + MISSINGNESS_FIELDS.len();

/// Training column order of the model input.
pub const FEATURE_ORDER: [&str; FEATURE_COUNT] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
    "Insulin_Missing",
    "SkinThickness_Missing",
    "BMI_Missing",
    "BloodPressure_Missing",
    "Glucose_Missing",
];

/// Fixed-width model input: scaled clinical values followed by unscaled
/// missingness indicators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The eight scaled clinical values.
    #[must_use]
    pub fn clinical(&self) -> &[f64] {
        &self.0[..CLINICAL_FIELD_COUNT]
    }

    /// The five 0/1 missingness indicators.
    #[must_use]
    pub fn indicators(&self) -> &[f64] {
        &self.0[CLINICAL_FIELD_COUNT..]
    }
}

impl Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

/// Concatenates scaled clinical values and indicators in [`FEATURE_ORDER`].
pub struct FeatureAssembler;

impl FeatureAssembler {
    #[must_use]
    pub fn assemble(scaled: &ClinicalValues, flags: &MissingnessFlags) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        out[..CLINICAL_FIELD_COUNT].copy_from_slice(scaled.as_slice());
        out[CLINICAL_FIELD_COUNT..].copy_from_slice(&flags.indicators());
        FeatureVector(out)
    }
}
