//! Classifier adapters: Implementations of `Classifier` from exported model
//! weights.
//!
//! Two export formats are supported, tagged by `kind` in `classifier.json`:
//! - `logistic`: one weight per input plus an intercept
//! - `dense`: a feed-forward network whose last layer is a single sigmoid
//!   unit (the exported form of the Keras network used in training)

use serde::{Deserialize, Serialize};

use crate::domain::{FEATURE_COUNT, FEATURE_ORDER};
use crate::ports::{Classifier, InferenceError};

use super::ArtifactError;

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Sigmoid => sigmoid(x),
            Self::Tanh => x.tanh(),
            Self::Linear => x,
        }
    }
}

/// One fully connected layer, `weights[out][in]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    fn input_width(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Model weights exported by the training pipeline (`classifier.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ExportedClassifier {
    Logistic {
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
    },
    Dense {
        feature_names: Vec<String>,
        layers: Vec<DenseLayer>,
    },
}

#[derive(Debug, Clone)]
enum Model {
    Logistic { coefficients: Vec<f64>, intercept: f64 },
    Dense { layers: Vec<DenseLayer> },
}

/// Validated classifier ready for inference.
#[derive(Debug, Clone)]
pub struct ModelClassifier {
    feature_names: Vec<String>,
    model: Model,
}

impl ModelClassifier {
    /// Validate an export against [`FEATURE_ORDER`] and check its shapes.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the input columns differ from the
    /// assembler's order or the weights cannot produce one probability.
    pub fn from_export(export: ExportedClassifier) -> Result<Self, ArtifactError> {
        let (feature_names, model) = match export {
            ExportedClassifier::Logistic {
                feature_names,
                coefficients,
                intercept,
            } => {
                if coefficients.len() != FEATURE_COUNT {
                    return Err(invalid(format!(
                        "expected {FEATURE_COUNT} coefficients, got {}",
                        coefficients.len()
                    )));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(invalid("coefficients and intercept must be finite".into()));
                }
                (feature_names, Model::Logistic { coefficients, intercept })
            }
            ExportedClassifier::Dense {
                feature_names,
                layers,
            } => {
                validate_layers(&layers)?;
                (feature_names, Model::Dense { layers })
            }
        };

        if feature_names.iter().map(String::as_str).ne(FEATURE_ORDER) {
            return Err(ArtifactError::FeatureOrder {
                artifact: "classifier",
                expected: FEATURE_ORDER.iter().map(|s| (*s).to_string()).collect(),
                found: feature_names,
            });
        }

        Ok(Self {
            feature_names,
            model,
        })
    }

    /// Short description for startup logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.model {
            Model::Logistic { .. } => "logistic".to_string(),
            Model::Dense { layers } => {
                let widths: Vec<String> = layers.iter().map(|l| l.bias.len().to_string()).collect();
                format!("dense {FEATURE_COUNT}->{}", widths.join("->"))
            }
        }
    }
}

fn invalid(message: String) -> ArtifactError {
    ArtifactError::Parameters {
        artifact: "classifier",
        message,
    }
}

fn validate_layers(layers: &[DenseLayer]) -> Result<(), ArtifactError> {
    let Some(last) = layers.last() else {
        return Err(invalid("dense model has no layers".into()));
    };

    let mut width = FEATURE_COUNT;
    for (i, layer) in layers.iter().enumerate() {
        if layer.weights.is_empty() || layer.weights.len() != layer.bias.len() {
            return Err(invalid(format!(
                "layer {i}: {} weight rows but {} biases",
                layer.weights.len(),
                layer.bias.len()
            )));
        }
        if layer.weights.iter().any(|row| row.len() != width) {
            return Err(invalid(format!(
                "layer {i}: expected {width} inputs per unit, got {}",
                layer.input_width()
            )));
        }
        let finite = layer.bias.iter().all(|b| b.is_finite())
            && layer.weights.iter().flatten().all(|w| w.is_finite());
        if !finite {
            return Err(invalid(format!("layer {i}: weights and biases must be finite")));
        }
        width = layer.bias.len();
    }

    if width != 1 || last.activation != Activation::Sigmoid {
        return Err(invalid(
            "last layer must have a single sigmoid output".into(),
        ));
    }
    Ok(())
}

/// Logistic function, split by sign so large magnitudes do not overflow.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl Classifier for ModelClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, InferenceError> {
        if features.len() != FEATURE_COUNT {
            return Err(InferenceError::InputWidth {
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }

        let probability = match &self.model {
            Model::Logistic {
                coefficients,
                intercept,
            } => {
                let z = coefficients
                    .iter()
                    .zip(features)
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                    + intercept;
                sigmoid(z)
            }
            Model::Dense { layers } => {
                let mut activations = features.to_vec();
                for layer in layers {
                    activations = layer.forward(&activations);
                }
                match activations.as_slice() {
                    [p] => *p,
                    other => {
                        return Err(InferenceError::OutputWidth {
                            expected: 1,
                            actual: other.len(),
                        })
                    }
                }
            }
        };

        if probability.is_finite() {
            Ok(probability)
        } else {
            Err(InferenceError::NonFinite(0))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn shipped_classifier() -> ModelClassifier {
        let export: ExportedClassifier =
            serde_json::from_str(include_str!("../../models/classifier.json"))
                .expect("shipped classifier should parse");
        ModelClassifier::from_export(export).expect("shipped classifier should validate")
    }

    fn order() -> Vec<String> {
        FEATURE_ORDER.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_logistic_zero_input_is_sigmoid_of_intercept() {
        let clf = shipped_classifier();
        let p = clf.predict_proba(&[0.0; FEATURE_COUNT]).unwrap();
        assert_relative_eq!(p, 1.0 / (1.0 + 0.85f64.exp()), max_relative = 1e-12);
        assert_eq!(clf.describe(), "logistic");
    }

    #[test]
    fn test_dense_network_forward_pass() {
        // Hidden unit copies Glucose through relu; output is sigmoid(2h - 1).
        let mut hidden = vec![0.0; FEATURE_COUNT];
        hidden[1] = 1.0;
        let export = ExportedClassifier::Dense {
            feature_names: order(),
            layers: vec![
                DenseLayer {
                    weights: vec![hidden],
                    bias: vec![0.0],
                    activation: Activation::Relu,
                },
                DenseLayer {
                    weights: vec![vec![2.0]],
                    bias: vec![-1.0],
                    activation: Activation::Sigmoid,
                },
            ],
        };
        let clf = ModelClassifier::from_export(export).unwrap();
        assert_eq!(clf.describe(), "dense 13->1->1");

        let mut x = [0.0; FEATURE_COUNT];
        x[1] = 0.5;
        assert_relative_eq!(clf.predict_proba(&x).unwrap(), 0.5, max_relative = 1e-12);

        // Negative glucose is clipped by relu.
        x[1] = -4.0;
        assert_relative_eq!(clf.predict_proba(&x).unwrap(), sigmoid(-1.0), max_relative = 1e-12);
    }

    #[test]
    fn test_dense_requires_sigmoid_head() {
        let export = ExportedClassifier::Dense {
            feature_names: order(),
            layers: vec![DenseLayer {
                weights: vec![vec![0.1; FEATURE_COUNT]],
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        };
        assert!(ModelClassifier::from_export(export).is_err());
    }

    #[test]
    fn test_dense_rejects_broken_chain() {
        let export = ExportedClassifier::Dense {
            feature_names: order(),
            layers: vec![
                DenseLayer {
                    weights: vec![vec![0.1; FEATURE_COUNT]; 4],
                    bias: vec![0.0; 4],
                    activation: Activation::Relu,
                },
                DenseLayer {
                    weights: vec![vec![0.1; 3]],
                    bias: vec![0.0],
                    activation: Activation::Sigmoid,
                },
            ],
        };
        assert!(matches!(
            ModelClassifier::from_export(export),
            Err(ArtifactError::Parameters { .. })
        ));
    }

    #[test]
    fn test_rejects_reordered_inputs() {
        let mut names = order();
        names.swap(8, 12);
        let export = ExportedClassifier::Logistic {
            feature_names: names,
            coefficients: vec![0.0; FEATURE_COUNT],
            intercept: 0.0,
        };
        assert!(matches!(
            ModelClassifier::from_export(export),
            Err(ArtifactError::FeatureOrder { artifact: "classifier", .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_input_width() {
        let clf = shipped_classifier();
        assert_eq!(
            clf.predict_proba(&[0.0; 8]),
            Err(InferenceError::InputWidth { expected: 13, actual: 8 })
        );
    }

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(1000.0), 1.0);
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert_eq!(sigmoid(0.0), 0.5);
    }
}
