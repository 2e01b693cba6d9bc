//! Zero-sentinel imputation with missingness indicators.

use super::params::ImputationMedians;
use super::record::{ClinicalField, ClinicalValues};

/// Fields where a recorded zero stands for "not measured", in the order
/// their indicator columns appear in the feature vector.
pub const MISSINGNESS_FIELDS: [ClinicalField; 5] = [
    ClinicalField::Insulin,
    ClinicalField::SkinThickness,
    ClinicalField::Bmi,
    ClinicalField::BloodPressure,
    ClinicalField::Glucose,
];

/// One "was missing" flag per entry of [`MISSINGNESS_FIELDS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissingnessFlags([bool; MISSINGNESS_FIELDS.len()]);

impl MissingnessFlags {
    /// Whether `field` was recorded as zero. Always false for fields outside
    /// [`MISSINGNESS_FIELDS`].
    #[must_use]
    pub fn is_missing(&self, field: ClinicalField) -> bool {
        MISSINGNESS_FIELDS
            .iter()
            .position(|&f| f == field)
            .is_some_and(|i| self.0[i])
    }

    /// Number of imputed fields.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&m| m).count()
    }

    /// Flags as 0.0 / 1.0 model inputs.
    #[must_use]
    pub fn indicators(&self) -> [f64; MISSINGNESS_FIELDS.len()] {
        self.0.map(|m| if m { 1.0 } else { 0.0 })
    }

    /// Names of the missing fields, for diagnostics.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<ClinicalField> {
        MISSINGNESS_FIELDS
            .iter()
            .zip(self.0)
            .filter_map(|(&field, missing)| missing.then_some(field))
            .collect()
    }
}

/// Replaces sentinel zeros with training medians.
#[derive(Debug, Clone, Copy)]
pub struct Imputer<'a> {
    medians: &'a ImputationMedians,
}

impl<'a> Imputer<'a> {
    #[must_use]
    pub fn new(medians: &'a ImputationMedians) -> Self {
        Self { medians }
    }

    /// Flag and fill exact zeros in the monitored fields.
    ///
    /// Flags are derived from the raw values before any replacement. A
    /// small but non-zero measurement is kept as is.
    #[must_use]
    pub fn impute(&self, raw: ClinicalValues) -> (ClinicalValues, MissingnessFlags) {
        let mut values = raw;
        let mut flags = MissingnessFlags::default();

        for (i, &field) in MISSINGNESS_FIELDS.iter().enumerate() {
            if raw[field] == 0.0 {
                flags.0[i] = true;
                if let Some(median) = self.medians.get(field) {
                    values[field] = median;
                }
            }
        }

        (values, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::tests::shipped_params;
    use crate::domain::record::tests::pima_first_row;

    #[test]
    fn test_zero_insulin_is_flagged_and_filled() {
        let params = shipped_params();
        let imputer = Imputer::new(&params.medians);

        let (values, flags) = imputer.impute(pima_first_row().clinical_values());

        assert!(flags.is_missing(ClinicalField::Insulin));
        assert_eq!(flags.count(), 1);
        assert_eq!(flags.indicators(), [1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(values[ClinicalField::Insulin], 125.0);
        assert_eq!(values[ClinicalField::Glucose], 148.0);
    }

    #[test]
    fn test_flag_iff_raw_zero() {
        let params = shipped_params();
        let imputer = Imputer::new(&params.medians);

        for raw in [0.0, 1e-9, 0.5, 1.0, 899.0] {
            let mut values = pima_first_row().clinical_values();
            for field in MISSINGNESS_FIELDS {
                values[field] = raw;
            }
            let (imputed, flags) = imputer.impute(values);
            for field in MISSINGNESS_FIELDS {
                assert_eq!(flags.is_missing(field), raw == 0.0, "{field} at {raw}");
                if raw != 0.0 {
                    assert_eq!(imputed[field], raw);
                }
            }
        }
    }

    #[test]
    fn test_pregnancies_zero_is_not_missing() {
        let params = shipped_params();
        let imputer = Imputer::new(&params.medians);

        let mut record = pima_first_row();
        record.pregnancies = 0;
        let (values, flags) = imputer.impute(record.clinical_values());

        assert!(!flags.is_missing(ClinicalField::Pregnancies));
        assert_eq!(values[ClinicalField::Pregnancies], 0.0);
    }

    #[test]
    fn test_imputation_is_idempotent() {
        let params = shipped_params();
        let imputer = Imputer::new(&params.medians);

        let mut record = pima_first_row();
        record.skin_thickness = 0.0;
        record.glucose = 0.0;
        let (once, _) = imputer.impute(record.clinical_values());
        let (twice, flags) = imputer.impute(once);

        assert_eq!(once, twice);
        assert_eq!(flags.count(), 0);
    }

    #[test]
    fn test_missing_fields_preserve_indicator_order() {
        let params = shipped_params();
        let imputer = Imputer::new(&params.medians);

        let mut record = pima_first_row();
        record.glucose = 0.0;
        record.bmi = 0.0;
        let (_, flags) = imputer.impute(record.clinical_values());

        assert_eq!(
            flags.missing_fields(),
            vec![ClinicalField::Insulin, ClinicalField::Bmi, ClinicalField::Glucose]
        );
    }
}
