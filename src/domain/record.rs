//! Clinical input record for diabetes risk prediction.
//!
//! Based on the Pima Indians Diabetes dataset features. A recorded zero in
//! some of these fields means "not measured", which the imputer handles.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Number of clinical measurements in a record.
pub const CLINICAL_FIELD_COUNT: usize = 8;

/// A named clinical measurement.
///
/// Variant order is the training column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClinicalField {
    Pregnancies,
    Glucose,
    BloodPressure,
    SkinThickness,
    Insulin,
    Bmi,
    DiabetesPedigreeFunction,
    Age,
}

impl ClinicalField {
    /// All fields in training column order.
    pub const ALL: [ClinicalField; CLINICAL_FIELD_COUNT] = [
        Self::Pregnancies,
        Self::Glucose,
        Self::BloodPressure,
        Self::SkinThickness,
        Self::Insulin,
        Self::Bmi,
        Self::DiabetesPedigreeFunction,
        Self::Age,
    ];

    /// Column name as used by the training data and the request payload.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pregnancies => "Pregnancies",
            Self::Glucose => "Glucose",
            Self::BloodPressure => "BloodPressure",
            Self::SkinThickness => "SkinThickness",
            Self::Insulin => "Insulin",
            Self::Bmi => "BMI",
            Self::DiabetesPedigreeFunction => "DiabetesPedigreeFunction",
            Self::Age => "Age",
        }
    }

    /// Position of this field in a clinical value array.
    #[must_use]
    pub fn position(self) -> usize {
        self as usize
    }

    /// Plausible range accepted at the service boundary.
    #[must_use]
    pub fn range(self) -> FieldRange {
        match self {
            Self::Pregnancies => FieldRange::inclusive(0.0, 20.0),
            Self::Glucose => FieldRange::inclusive(0.0, 300.0),
            Self::BloodPressure => FieldRange::inclusive(0.0, 200.0),
            Self::SkinThickness => FieldRange::inclusive(0.0, 100.0),
            Self::Insulin => FieldRange::inclusive(0.0, 900.0),
            Self::Bmi => FieldRange::inclusive(0.0, 70.0),
            // Box-Cox input, must stay strictly positive.
            Self::DiabetesPedigreeFunction => FieldRange::exclusive_min(0.0, 3.0),
            Self::Age => FieldRange::inclusive(1.0, 120.0),
        }
    }
}

impl fmt::Display for ClinicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed (or left-open) interval of accepted values for a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
    pub min_exclusive: bool,
}

impl FieldRange {
    const fn inclusive(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_exclusive: false,
        }
    }

    const fn exclusive_min(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_exclusive: true,
        }
    }

    /// Whether `value` is finite and inside the range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() || value > self.max {
            return false;
        }
        if self.min_exclusive {
            value > self.min
        } else {
            value >= self.min
        }
    }
}

impl fmt::Display for FieldRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.min_exclusive { '(' } else { '[' };
        write!(f, "{open}{}, {}]", self.min, self.max)
    }
}

/// A single out-of-range field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: ClinicalField,
    pub value: f64,
    pub range: FieldRange,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} out of range {}", self.field, self.value, self.range)
    }
}

/// Rejection of a request before it enters the pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The payload is not a well-formed record (missing field, wrong type,
    /// unknown key).
    #[error("malformed record: {0}")]
    Malformed(String),

    /// One or more fields lie outside their plausible range.
    #[error("{}", join_violations(.0))]
    OutOfRange(Vec<FieldViolation>),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raw clinical measurements as submitted by the caller.
///
/// Field names on the wire match the training columns exactly. Pregnancies
/// and Age are integers; a fractional value for them is a type error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureRecord {
    /// Number of times pregnant (0-20)
    #[serde(rename = "Pregnancies")]
    pub pregnancies: u32,

    /// Plasma glucose concentration, 2h oral glucose tolerance test (mg/dL)
    #[serde(rename = "Glucose")]
    pub glucose: f64,

    /// Diastolic blood pressure (mmHg)
    #[serde(rename = "BloodPressure")]
    pub blood_pressure: f64,

    /// Triceps skin fold thickness (mm)
    #[serde(rename = "SkinThickness")]
    pub skin_thickness: f64,

    /// 2-hour serum insulin (mu U/ml)
    #[serde(rename = "Insulin")]
    pub insulin: f64,

    /// Body mass index (kg/m^2)
    #[serde(rename = "BMI")]
    pub bmi: f64,

    /// Diabetes pedigree function score
    #[serde(rename = "DiabetesPedigreeFunction")]
    pub diabetes_pedigree_function: f64,

    /// Age in years
    #[serde(rename = "Age")]
    pub age: u32,
}

impl FeatureRecord {
    /// Parse a record from a JSON payload.
    ///
    /// # Errors
    /// Returns `ValidationError::Malformed` if the payload does not describe
    /// exactly the eight fields with the right types.
    pub fn from_json(payload: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(payload).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Value of a single field.
    #[must_use]
    pub fn get(&self, field: ClinicalField) -> f64 {
        match field {
            ClinicalField::Pregnancies => f64::from(self.pregnancies),
            ClinicalField::Glucose => self.glucose,
            ClinicalField::BloodPressure => self.blood_pressure,
            ClinicalField::SkinThickness => self.skin_thickness,
            ClinicalField::Insulin => self.insulin,
            ClinicalField::Bmi => self.bmi,
            ClinicalField::DiabetesPedigreeFunction => self.diabetes_pedigree_function,
            ClinicalField::Age => f64::from(self.age),
        }
    }

    /// Measurements in training column order.
    #[must_use]
    pub fn clinical_values(&self) -> ClinicalValues {
        ClinicalValues(ClinicalField::ALL.map(|field| self.get(field)))
    }

    /// Check every field against its plausible range.
    ///
    /// # Errors
    /// Returns all violations at once, never just the first one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let violations: Vec<FieldViolation> = ClinicalField::ALL
            .iter()
            .filter_map(|&field| {
                let value = self.get(field);
                let range = field.range();
                (!range.contains(value)).then_some(FieldViolation { field, value, range })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange(violations))
        }
    }
}

/// Eight clinical values in training column order, indexable by field.
///
/// Carries a record through imputation, power transforms and scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClinicalValues(pub [f64; CLINICAL_FIELD_COUNT]);

impl ClinicalValues {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Build from a slice, returning `None` on a length mismatch.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        <[f64; CLINICAL_FIELD_COUNT]>::try_from(values).ok().map(Self)
    }
}

impl Index<ClinicalField> for ClinicalValues {
    type Output = f64;

    fn index(&self, field: ClinicalField) -> &f64 {
        &self.0[field.position()]
    }
}

impl IndexMut<ClinicalField> for ClinicalValues {
    fn index_mut(&mut self, field: ClinicalField) -> &mut f64 {
        &mut self.0[field.position()]
    }
}
