//! Frozen preprocessing parameters fitted at training time.
//!
//! Imputation medians and power-transform lambdas ship together in one
//! versioned artifact so that inference can never drift from training.

use serde::{Deserialize, Serialize};

use super::record::ClinicalField;

/// Training medians for the fields where zero means "not measured".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImputationMedians {
    #[serde(rename = "Insulin")]
    pub insulin: f64,
    #[serde(rename = "SkinThickness")]
    pub skin_thickness: f64,
    #[serde(rename = "BMI")]
    pub bmi: f64,
    #[serde(rename = "BloodPressure")]
    pub blood_pressure: f64,
    #[serde(rename = "Glucose")]
    pub glucose: f64,
}

impl ImputationMedians {
    /// Median for `field`, or `None` if the field is never imputed.
    #[must_use]
    pub fn get(&self, field: ClinicalField) -> Option<f64> {
        match field {
            ClinicalField::Insulin => Some(self.insulin),
            ClinicalField::SkinThickness => Some(self.skin_thickness),
            ClinicalField::Bmi => Some(self.bmi),
            ClinicalField::BloodPressure => Some(self.blood_pressure),
            ClinicalField::Glucose => Some(self.glucose),
            _ => None,
        }
    }
}

/// Power-transform lambdas, one per transformed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerLambdas {
    #[serde(rename = "Insulin")]
    pub insulin: f64,
    #[serde(rename = "DiabetesPedigreeFunction")]
    pub diabetes_pedigree_function: f64,
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Pregnancies")]
    pub pregnancies: f64,
    #[serde(rename = "BloodPressure")]
    pub blood_pressure: f64,
}

impl PowerLambdas {
    /// Lambda for `field`, or `None` if the field is not power-transformed.
    #[must_use]
    pub fn get(&self, field: ClinicalField) -> Option<f64> {
        match field {
            ClinicalField::Insulin => Some(self.insulin),
            ClinicalField::DiabetesPedigreeFunction => Some(self.diabetes_pedigree_function),
            ClinicalField::Age => Some(self.age),
            ClinicalField::Pregnancies => Some(self.pregnancies),
            ClinicalField::BloodPressure => Some(self.blood_pressure),
            _ => None,
        }
    }
}

/// Immutable preprocessing parameters, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformParameters {
    /// Identifier of the training run these values come from.
    pub version: String,
    pub medians: ImputationMedians,
    pub lambdas: PowerLambdas,
}

impl TransformParameters {
    /// Check that the parameters can drive the pipeline.
    ///
    /// Medians must be strictly positive: an imputed value may feed Box-Cox.
    ///
    /// # Errors
    /// Returns every problem found as a human-readable string.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.version.trim().is_empty() {
            errors.push("version must not be empty".to_string());
        }

        for field in ClinicalField::ALL {
            if let Some(median) = self.medians.get(field) {
                if !median.is_finite() || median <= 0.0 {
                    errors.push(format!("median for {field} must be finite and > 0, got {median}"));
                }
            }
            if let Some(lambda) = self.lambdas.get(field) {
                if !lambda.is_finite() {
                    errors.push(format!("lambda for {field} must be finite, got {lambda}"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
