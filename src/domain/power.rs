//! Fixed-lambda power transforms.
//!
//! Lambdas are fitted once on the training set and frozen; a single request
//! can never support re-estimating them.

use super::params::PowerLambdas;
use super::record::{ClinicalField, ClinicalValues};

/// Fields normalized with Box-Cox (strictly positive by construction once
/// imputation has run).
pub const BOX_COX_FIELDS: [ClinicalField; 3] = [
    ClinicalField::Insulin,
    ClinicalField::DiabetesPedigreeFunction,
    ClinicalField::Age,
];

/// Fields normalized with Yeo-Johnson (zero is a legitimate value).
pub const YEO_JOHNSON_FIELDS: [ClinicalField; 2] =
    [ClinicalField::Pregnancies, ClinicalField::BloodPressure];

/// A power transform was handed a value outside its analytic domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Box-Cox requires a strictly positive input, got {value}")]
    BoxCoxNonPositive { value: f64 },

    #[error("power transform input must be finite, got {value}")]
    NonFinite { value: f64 },

    #[error("{field}: {source}")]
    Field {
        field: ClinicalField,
        #[source]
        source: Box<DomainError>,
    },
}

/// Box-Cox transform of `x` with parameter `lambda`.
///
/// `(x^λ - 1) / λ`, or `ln(x)` when λ is zero. Uses `exp_m1` so that small
/// lambdas do not lose precision.
///
/// # Errors
/// Returns `DomainError` if `x` is not finite or not strictly positive.
pub fn box_cox(x: f64, lambda: f64) -> Result<f64, DomainError> {
    if !x.is_finite() {
        return Err(DomainError::NonFinite { value: x });
    }
    if x <= 0.0 {
        return Err(DomainError::BoxCoxNonPositive { value: x });
    }

    let log_x = x.ln();
    if lambda.abs() < 1e-19 {
        Ok(log_x)
    } else {
        Ok((lambda * log_x).exp_m1() / lambda)
    }
}

/// Yeo-Johnson transform of `x` with parameter `lambda`.
///
/// Defined on the whole real line:
/// - `x >= 0`: `((x + 1)^λ - 1) / λ`, or `ln(x + 1)` when λ is zero
/// - `x < 0`: `-((1 - x)^(2 - λ) - 1) / (2 - λ)`, or `-ln(1 - x)` when λ is two
///
/// # Errors
/// Returns `DomainError::NonFinite` for NaN or infinite input.
pub fn yeo_johnson(x: f64, lambda: f64) -> Result<f64, DomainError> {
    if !x.is_finite() {
        return Err(DomainError::NonFinite { value: x });
    }

    let out = if x >= 0.0 {
        if lambda.abs() < f64::EPSILON {
            x.ln_1p()
        } else {
            (lambda * x.ln_1p()).exp_m1() / lambda
        }
    } else {
        let mirrored = 2.0 - lambda;
        if mirrored.abs() < f64::EPSILON {
            -(-x).ln_1p()
        } else {
            -(mirrored * (-x).ln_1p()).exp_m1() / mirrored
        }
    };
    Ok(out)
}

/// Applies the frozen Box-Cox and Yeo-Johnson transforms in place.
#[derive(Debug, Clone, Copy)]
pub struct PowerTransformer<'a> {
    lambdas: &'a PowerLambdas,
}

impl<'a> PowerTransformer<'a> {
    #[must_use]
    pub fn new(lambdas: &'a PowerLambdas) -> Self {
        Self { lambdas }
    }

    /// Transform the designated fields; all others pass through.
    ///
    /// Must run after imputation, otherwise a sentinel zero reaches Box-Cox.
    ///
    /// # Errors
    /// Returns `DomainError::Field` naming the offending field.
    pub fn apply(&self, values: ClinicalValues) -> Result<ClinicalValues, DomainError> {
        let mut out = values;

        for field in BOX_COX_FIELDS {
            out[field] = self.transform(field, values[field], box_cox)?;
        }
        for field in YEO_JOHNSON_FIELDS {
            out[field] = self.transform(field, values[field], yeo_johnson)?;
        }

        Ok(out)
    }

    fn transform(
        &self,
        field: ClinicalField,
        x: f64,
        f: fn(f64, f64) -> Result<f64, DomainError>,
    ) -> Result<f64, DomainError> {
        let Some(lambda) = self.lambdas.get(field) else {
            return Ok(x);
        };
        f(x, lambda).map_err(|source| DomainError::Field {
            field,
            source: Box::new(source),
        })
    }
}
