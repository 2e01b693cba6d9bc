//! Prediction result types.
//!
//! Represents the classifier output after the fixed decision rule.

use serde::{Deserialize, Serialize};

/// Probability at or above which a record is classified as diabetic.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Decimal places kept in the displayed probability.
const DISPLAY_DECIMALS: i32 = 4;

/// Binary outcome of the decision rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "No Diabetes")]
    NoDiabetes,
    #[serde(rename = "Diabetes")]
    Diabetes,
}

impl Outcome {
    /// Numeric label (0 = no diabetes, 1 = diabetes).
    #[must_use]
    pub fn label(self) -> u8 {
        match self {
            Self::NoDiabetes => 0,
            Self::Diabetes => 1,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDiabetes => write!(f, "No Diabetes"),
            Self::Diabetes => write!(f, "Diabetes"),
        }
    }
}

/// Classifier probability together with the decision derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    /// Full-precision probability of the positive class (0.0 to 1.0)
    pub probability: f64,

    /// Outcome derived from `probability`
    pub outcome: Outcome,
}

impl PredictionResult {
    /// Apply the decision rule to a probability.
    ///
    /// The comparison is inclusive and uses the unrounded value.
    #[must_use]
    pub fn new(probability: f64) -> Self {
        let outcome = if probability >= DECISION_THRESHOLD {
            Outcome::Diabetes
        } else {
            Outcome::NoDiabetes
        };
        Self {
            probability,
            outcome,
        }
    }

    #[must_use]
    pub fn label(&self) -> u8 {
        self.outcome.label()
    }

    /// Wire representation with the probability rounded for display.
    #[must_use]
    pub fn to_response(&self) -> PredictionResponse {
        let factor = 10f64.powi(DISPLAY_DECIMALS);
        PredictionResponse {
            prediction: self.label(),
            probability: (self.probability * factor).round() / factor,
            predicted_outcome: self.outcome,
        }
    }
}

/// Response body returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// 0 = No Diabetes, 1 = Diabetes
    pub prediction: u8,

    /// Probability rounded to four decimals (display only)
    pub probability: f64,

    /// Human-readable outcome
    pub predicted_outcome: Outcome,
}
