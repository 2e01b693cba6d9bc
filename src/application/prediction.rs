//! Prediction service: Runs one record through the frozen pipeline.
//!
//! Imputer → PowerTransformer → Scaler → FeatureAssembler → Classifier →
//! decision rule. Every stage is deterministic and holds no mutable state,
//! so one service instance can be shared across threads.

use std::sync::Arc;

use crate::domain::{
    ClinicalValues, FeatureAssembler, FeatureRecord, FeatureVector, Imputer, PowerTransformer,
    PredictionResult, TransformParameters, CLINICAL_FIELD_COUNT,
};
use crate::ports::{Classifier, InferenceError, Scaler};
use crate::Result;

/// Service for running diabetes risk predictions.
///
/// Holds immutable handles to the pre-fitted artifacts; they are injected at
/// construction and never reloaded.
pub struct PredictionService<S: ?Sized = dyn Scaler, C: ?Sized = dyn Classifier> {
    scaler: Arc<S>,
    classifier: Arc<C>,
    params: Arc<TransformParameters>,
}

impl<S: ?Sized, C: ?Sized> Clone for PredictionService<S, C> {
    fn clone(&self) -> Self {
        Self {
            scaler: Arc::clone(&self.scaler),
            classifier: Arc::clone(&self.classifier),
            params: Arc::clone(&self.params),
        }
    }
}

impl<S, C> PredictionService<S, C>
where
    S: Scaler + ?Sized,
    C: Classifier + ?Sized,
{
    /// Create a new prediction service.
    pub fn new(scaler: Arc<S>, classifier: Arc<C>, params: Arc<TransformParameters>) -> Self {
        Self {
            scaler,
            classifier,
            params,
        }
    }

    /// Version tag of the transform parameters in use.
    #[must_use]
    pub fn params_version(&self) -> &str {
        &self.params.version
    }

    /// Validate a record and turn it into the 13-wide model input.
    ///
    /// # Errors
    /// - `Validation` if any field is out of range
    /// - `NumericDomain` if a power transform rejects its input
    /// - `Inference` if the scaler breaks its output contract
    pub fn preprocess(&self, record: &FeatureRecord) -> Result<FeatureVector> {
        record.validate()?;

        let (imputed, flags) = Imputer::new(&self.params.medians).impute(record.clinical_values());
        tracing::debug!(missing = ?flags.missing_fields(), "Imputed sentinel zeros");

        let transformed = PowerTransformer::new(&self.params.lambdas).apply(imputed)?;
        tracing::debug!("Applied power transforms");

        let scaled = self.scaler.transform(transformed.as_slice())?;
        let scaled =
            ClinicalValues::from_slice(&scaled).ok_or(InferenceError::OutputWidth {
                expected: CLINICAL_FIELD_COUNT,
                actual: scaled.len(),
            })?;
        if let Some(i) = scaled.as_slice().iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite(i).into());
        }
        tracing::debug!("Scaled clinical values");

        Ok(FeatureAssembler::assemble(&scaled, &flags))
    }

    /// Run the full pipeline and apply the decision rule.
    ///
    /// # Errors
    /// Everything [`Self::preprocess`] returns, plus `Inference` if the
    /// classifier fails or yields a value outside `[0, 1]`.
    pub fn predict(&self, record: &FeatureRecord) -> Result<PredictionResult> {
        let features = self.preprocess(record)?;

        let probability = self.classifier.predict_proba(features.as_slice())?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::ProbabilityOutOfRange(probability).into());
        }

        let result = PredictionResult::new(probability);
        tracing::info!(
            outcome = %result.outcome,
            probability = result.to_response().probability,
            "Prediction complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::classifier::tests::shipped_classifier;
    use crate::adapters::scaler::tests::shipped_scaler;
    use crate::domain::fixtures::{pima_first_row, shipped_params};
    use crate::domain::{Outcome, FEATURE_COUNT};
    use crate::GlucoguardError;
    use approx::assert_abs_diff_eq;

    fn shipped_service() -> PredictionService {
        let scaler: Arc<dyn Scaler> = Arc::new(shipped_scaler());
        let classifier: Arc<dyn Classifier> = Arc::new(shipped_classifier());
        PredictionService::new(scaler, classifier, Arc::new(shipped_params()))
    }

    fn healthy_row() -> FeatureRecord {
        FeatureRecord {
            pregnancies: 0,
            glucose: 85.0,
            blood_pressure: 66.0,
            skin_thickness: 29.0,
            insulin: 94.0,
            bmi: 26.6,
            diabetes_pedigree_function: 0.351,
            age: 31,
        }
    }

    #[test]
    fn test_golden_feature_vector() {
        let vector = shipped_service().preprocess(&pima_first_row()).unwrap();
        let expected = [
            0.95233955772167,
            0.7965662379865863,
            0.897612744251339,
            1.2147469684058692,
            0.23918870179885976,
            0.5524130218631107,
            0.47721777895626033,
            1.6872505129473945,
            1.0,
            0.0,
            0.0,
            0.0,
            0.0,
        ];
        assert_eq!(vector.len(), FEATURE_COUNT);
        for (actual, expected) in vector.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*actual, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let result = shipped_service().predict(&pima_first_row()).unwrap();
        assert_abs_diff_eq!(result.probability, 0.8396902037410677, epsilon = 1e-9);
        assert_eq!(result.label(), 1);
        assert_eq!(result.outcome, Outcome::Diabetes);
        assert_eq!(result.to_response().probability, 0.8397);
    }

    #[test]
    fn test_zero_pregnancies_is_not_missing() {
        let service = shipped_service();
        let vector = service.preprocess(&healthy_row()).unwrap();

        assert_eq!(vector.indicators(), &[0.0; 5]);
        assert_abs_diff_eq!(vector[0], -1.5895182588607157, epsilon = 1e-9);

        let result = service.predict(&healthy_row()).unwrap();
        assert_abs_diff_eq!(result.probability, 0.0619374347263406, epsilon = 1e-9);
        assert_eq!(result.outcome, Outcome::NoDiabetes);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let service = shipped_service();
        let first = service.predict(&pima_first_row()).unwrap();
        for _ in 0..10 {
            assert_eq!(service.predict(&pima_first_row()).unwrap(), first);
        }
    }

    #[test]
    fn test_shared_across_threads() {
        let service = shipped_service();
        let expected = service.predict(&pima_first_row()).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| service.predict(&pima_first_row()).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_out_of_range_record_never_reaches_the_model() {
        let mut record = pima_first_row();
        record.glucose = 350.0;
        record.age = 0;

        let err = shipped_service().predict(&record).unwrap_err();
        match err {
            GlucoguardError::Validation(e) => {
                let message = e.to_string();
                assert!(message.contains("Glucose"));
                assert!(message.contains("Age"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_all_sentinels_missing() {
        let mut record = healthy_row();
        record.glucose = 0.0;
        record.blood_pressure = 0.0;
        record.skin_thickness = 0.0;
        record.insulin = 0.0;
        record.bmi = 0.0;

        let vector = shipped_service().preprocess(&record).unwrap();
        assert_eq!(vector.indicators(), &[1.0; 5]);
        assert!(vector.as_slice().iter().all(|v| v.is_finite()));
    }

    struct FixedScaler(Vec<f64>);

    impl Scaler for FixedScaler {
        fn feature_names(&self) -> &[String] {
            &[]
        }

        fn transform(&self, _clinical: &[f64]) -> std::result::Result<Vec<f64>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedClassifier(f64);

    impl Classifier for FixedClassifier {
        fn feature_names(&self) -> &[String] {
            &[]
        }

        fn predict_proba(&self, _features: &[f64]) -> std::result::Result<f64, InferenceError> {
            Ok(self.0)
        }
    }

    fn service_with(scaled: Vec<f64>, probability: f64) -> PredictionService<FixedScaler, FixedClassifier> {
        PredictionService::new(
            Arc::new(FixedScaler(scaled)),
            Arc::new(FixedClassifier(probability)),
            Arc::new(shipped_params()),
        )
    }

    #[test]
    fn test_threshold_boundary_through_service() {
        let at = service_with(vec![0.0; 8], 0.5).predict(&pima_first_row()).unwrap();
        assert_eq!(at.label(), 1);

        let below = service_with(vec![0.0; 8], 0.49999).predict(&pima_first_row()).unwrap();
        assert_eq!(below.label(), 0);
    }

    #[test]
    fn test_scaler_contract_violations() {
        let short = service_with(vec![0.0; 7], 0.5).preprocess(&pima_first_row());
        assert!(matches!(
            short,
            Err(GlucoguardError::Inference(InferenceError::OutputWidth { expected: 8, actual: 7 }))
        ));

        let mut scaled = vec![0.0; 8];
        scaled[3] = f64::NAN;
        let non_finite = service_with(scaled, 0.5).preprocess(&pima_first_row());
        assert!(matches!(
            non_finite,
            Err(GlucoguardError::Inference(InferenceError::NonFinite(3)))
        ));
    }

    #[test]
    fn test_probability_outside_unit_interval() {
        for bad in [1.5, -0.1, f64::NAN] {
            let err = service_with(vec![0.0; 8], bad).predict(&pima_first_row()).unwrap_err();
            assert!(matches!(
                err,
                GlucoguardError::Inference(InferenceError::ProbabilityOutOfRange(_))
            ));
        }
    }
}
