//! Standard scaler adapter: Implementation of `Scaler` from exported
//! training statistics.
//!
//! `scaled = (x - mean) / scale`, column by column.

use serde::{Deserialize, Serialize};

use crate::domain::{ClinicalField, CLINICAL_FIELD_COUNT};
use crate::ports::{InferenceError, Scaler};

use super::ArtifactError;

/// Scaler parameters exported by the training pipeline (`scaler.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportedScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Validated standard scaler over the eight clinical fields.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: [f64; CLINICAL_FIELD_COUNT],
    scale: [f64; CLINICAL_FIELD_COUNT],
}

impl StandardScaler {
    /// Validate an export against the clinical column order.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the columns differ from the clinical
    /// fields, lengths disagree, or any parameter is unusable.
    pub fn from_export(export: ExportedScaler) -> Result<Self, ArtifactError> {
        let expected: Vec<String> = ClinicalField::ALL
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        if export.feature_names != expected {
            return Err(ArtifactError::FeatureOrder {
                artifact: "scaler",
                expected,
                found: export.feature_names,
            });
        }

        let mean = <[f64; CLINICAL_FIELD_COUNT]>::try_from(export.mean.as_slice()).map_err(|_| {
            ArtifactError::Parameters {
                artifact: "scaler",
                message: format!("mean has {} entries, expected {CLINICAL_FIELD_COUNT}", export.mean.len()),
            }
        })?;
        let scale =
            <[f64; CLINICAL_FIELD_COUNT]>::try_from(export.scale.as_slice()).map_err(|_| {
                ArtifactError::Parameters {
                    artifact: "scaler",
                    message: format!(
                        "scale has {} entries, expected {CLINICAL_FIELD_COUNT}",
                        export.scale.len()
                    ),
                }
            })?;

        for (i, (&m, &s)) in mean.iter().zip(scale.iter()).enumerate() {
            if !m.is_finite() || !s.is_finite() || s == 0.0 {
                return Err(ArtifactError::Parameters {
                    artifact: "scaler",
                    message: format!(
                        "column {} has mean {m} and scale {s}; both must be finite, scale non-zero",
                        export.feature_names[i]
                    ),
                });
            }
        }

        Ok(Self {
            feature_names: export.feature_names,
            mean,
            scale,
        })
    }
}

impl Scaler for StandardScaler {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn transform(&self, clinical: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if clinical.len() != CLINICAL_FIELD_COUNT {
            return Err(InferenceError::InputWidth {
                expected: CLINICAL_FIELD_COUNT,
                actual: clinical.len(),
            });
        }

        clinical
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .enumerate()
            .map(|(i, (&x, (&m, &s)))| {
                let z = (x - m) / s;
                if z.is_finite() {
                    Ok(z)
                } else {
                    Err(InferenceError::NonFinite(i))
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn shipped_scaler() -> StandardScaler {
        let export: ExportedScaler = serde_json::from_str(include_str!("../../models/scaler.json"))
            .expect("shipped scaler should parse");
        StandardScaler::from_export(export).expect("shipped scaler should validate")
    }

    fn unit_export() -> ExportedScaler {
        ExportedScaler {
            feature_names: ClinicalField::ALL.iter().map(|f| f.name().to_string()).collect(),
            mean: vec![1.0; 8],
            scale: vec![2.0; 8],
        }
    }

    #[test]
    fn test_standardizes_each_column() {
        let scaler = StandardScaler::from_export(unit_export()).unwrap();
        let out = scaler.transform(&[1.0, 3.0, 5.0, -1.0, 1.0, 1.0, 1.0, 9.0]).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 2.0, -1.0, 0.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let scaler = shipped_scaler();
        assert_eq!(
            scaler.transform(&[0.0; 13]),
            Err(InferenceError::InputWidth { expected: 8, actual: 13 })
        );
    }

    #[test]
    fn test_rejects_permuted_columns() {
        let mut export = unit_export();
        export.feature_names.swap(0, 1);
        assert!(matches!(
            StandardScaler::from_export(export),
            Err(ArtifactError::FeatureOrder { artifact: "scaler", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_scale() {
        let mut export = unit_export();
        export.scale[4] = 0.0;
        assert!(matches!(
            StandardScaler::from_export(export),
            Err(ArtifactError::Parameters { .. })
        ));
    }

    #[test]
    fn test_rejects_short_mean() {
        let mut export = unit_export();
        export.mean.pop();
        assert!(StandardScaler::from_export(export).is_err());
    }
}
