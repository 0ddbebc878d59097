//! TSK/ANFIS inference engine

use crate::config::AppConfig;
use crate::models::handle::ModelHandle;
use crate::models::loader::ModelLoader;
use crate::models::params::{ModelParameters, FEATURE_COUNT};
use crate::models::scoring::{argmax, ranked, softmax_in_place, SCORE_EPSILON};
use anyhow::{Context, Result};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by [`InferenceEngine::predict`]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PredictionError {
    #[error("Model not loaded")]
    ModelNotLoaded,
}

/// Result of evaluating one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the winning class
    pub class_index: usize,
    /// One score per class, in class-index order
    pub scores: Vec<f32>,
    /// No rule fired (total firing strength at or below epsilon)
    pub degenerate: bool,
    /// Scores went through softmax
    pub softmax_applied: bool,
}

impl Prediction {
    /// Score of the winning class
    pub fn confidence(&self) -> f32 {
        self.scores
            .get(self.class_index)
            .copied()
            .unwrap_or(f32::NAN)
    }

    /// A NaN input poisons every score; the class index is then meaningless
    pub fn is_nan_poisoned(&self) -> bool {
        self.scores.iter().any(|s| s.is_nan())
    }

    /// Up to `k` class indices by descending score
    pub fn ranked(&self, k: usize) -> Vec<usize> {
        ranked(&self.scores, k)
    }
}

/// Gaussian membership degree `exp(-0.5 * ((x - c) / s)^2)`
#[inline]
pub fn gauss_membership(x: f32, center: f32, sigma: f32) -> f32 {
    let z = (x - center) / sigma;
    (-0.5 * z * z).exp()
}

/// Evaluate a model against one raw feature vector.
///
/// Normalizes, fires every rule with a product t-norm, defuzzifies each
/// class by firing-strength-weighted average of the affine consequents, then
/// optionally applies softmax. When the total firing strength is at or below
/// [`SCORE_EPSILON`] every score is zero.
///
/// A NaN feature is not rejected: it yields an all-NaN score vector and
/// class 0. Check [`Prediction::is_nan_poisoned`] before trusting the index.
pub fn predict(model: &ModelParameters, raw: &[f32; FEATURE_COUNT], apply_softmax: bool) -> Prediction {
    let x = model.scaler().normalize(raw);
    let premise = model.premise();

    let mut scores = vec![0.0f32; model.num_classes()];
    let mut w_sum = 0.0f32;

    for (r, rule) in model.rules().iter().enumerate() {
        let mut w = 1.0f32;
        for i in 0..FEATURE_COUNT {
            let mf = rule[i] as usize;
            w *= gauss_membership(x[i], premise.center[i][mf], premise.sigma[i][mf]);
        }
        w_sum += w;

        for (c, numerator) in scores.iter_mut().enumerate() {
            *numerator += w * model.class_consequents(c)[r].evaluate(&x);
        }
    }

    let degenerate = w_sum <= SCORE_EPSILON;
    if degenerate {
        scores.fill(0.0);
    } else {
        for s in scores.iter_mut() {
            *s /= w_sum;
        }
    }

    if apply_softmax {
        softmax_in_place(&mut scores);
    }

    Prediction {
        class_index: argmax(&scores),
        scores,
        degenerate,
        softmax_applied: apply_softmax,
    }
}

/// Inference engine bound to a swappable model handle
pub struct InferenceEngine {
    /// Active model; replaced wholesale on reload
    handle: Arc<ModelHandle>,
    /// Default softmax setting for [`InferenceEngine::predict`]
    apply_softmax: bool,
}

impl InferenceEngine {
    /// Create an inference engine from configuration, loading the model file
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = config
            .model
            .max_bytes
            .map_or_else(ModelLoader::new, ModelLoader::with_max_bytes);
        let params = loader
            .load_from_path(&config.model.path)
            .with_context(|| format!("Failed to load model from {}", config.model.path))?;

        info!(
            path = %config.model.path,
            apply_softmax = config.model.apply_softmax,
            "Inference engine initialized"
        );

        Ok(Self::with_handle(
            Arc::new(ModelHandle::with_model(params)),
            config.model.apply_softmax,
        ))
    }

    /// Create an engine over an existing handle
    pub fn with_handle(handle: Arc<ModelHandle>, apply_softmax: bool) -> Self {
        Self {
            handle,
            apply_softmax,
        }
    }

    pub fn handle(&self) -> &Arc<ModelHandle> {
        &self.handle
    }

    pub fn apply_softmax(&self) -> bool {
        self.apply_softmax
    }

    /// Classify one feature vector with the configured softmax setting
    pub fn predict(&self, raw: &[f32; FEATURE_COUNT]) -> Result<Prediction, PredictionError> {
        self.predict_with(raw, self.apply_softmax)
    }

    /// Classify one feature vector against the current model snapshot
    pub fn predict_with(
        &self,
        raw: &[f32; FEATURE_COUNT],
        apply_softmax: bool,
    ) -> Result<Prediction, PredictionError> {
        let model = self.handle.snapshot().ok_or(PredictionError::ModelNotLoaded)?;
        let prediction = predict(&model, raw, apply_softmax);
        log_prediction(&model, &prediction);
        Ok(prediction)
    }

    /// Classify with the configured softmax setting, returning the model
    /// snapshot that produced the prediction alongside it
    pub fn predict_with_model(
        &self,
        raw: &[f32; FEATURE_COUNT],
    ) -> Result<(Arc<ModelParameters>, Prediction), PredictionError> {
        let model = self.handle.snapshot().ok_or(PredictionError::ModelNotLoaded)?;
        let prediction = predict(&model, raw, self.apply_softmax);
        log_prediction(&model, &prediction);
        Ok((model, prediction))
    }

    /// Classify a batch. The whole batch runs against a single snapshot.
    pub fn predict_batch(
        &self,
        batch: &[[f32; FEATURE_COUNT]],
    ) -> Result<Vec<Prediction>, PredictionError> {
        let model = self.handle.snapshot().ok_or(PredictionError::ModelNotLoaded)?;
        Ok(batch
            .iter()
            .map(|raw| {
                let prediction = predict(&model, raw, self.apply_softmax);
                log_prediction(&model, &prediction);
                prediction
            })
            .collect())
    }
}

fn log_prediction(model: &ModelParameters, prediction: &Prediction) {
    if prediction.is_nan_poisoned() {
        warn!(
            class_index = prediction.class_index,
            "NaN in feature vector, scores are not usable"
        );
    } else {
        debug!(
            class = %model.class_name(prediction.class_index),
            confidence = prediction.confidence(),
            degenerate = prediction.degenerate,
            "Prediction complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loader::tests::sample_model_json;
    use crate::models::loader::LoadError;
    use crate::models::params::{Consequent, Premise, RuleIndex, Scaler};
    use crate::models::registry::ClassRegistry;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sample_model() -> ModelParameters {
        ModelLoader::new()
            .parse(sample_model_json().to_string().as_bytes())
            .unwrap()
    }

    fn model(
        num_classes: usize,
        scaler: Scaler,
        premise: Premise,
        rules: Vec<RuleIndex>,
        consequents: Vec<Vec<Consequent>>,
    ) -> ModelParameters {
        let classes = ClassRegistry::new((0..num_classes).map(|c| format!("c{}", c)).collect()).unwrap();
        ModelParameters::new(classes, scaler, premise, rules, consequents).unwrap()
    }

    fn identity_scaler() -> Scaler {
        Scaler {
            mean: [0.0; FEATURE_COUNT],
            scale: [1.0; FEATURE_COUNT],
        }
    }

    fn uniform_premise(sigma: f32) -> Premise {
        Premise {
            center: [[-1.0, 1.0]; FEATURE_COUNT],
            sigma: [[sigma, sigma]; FEATURE_COUNT],
        }
    }

    fn bias_only(bias: f32) -> Consequent {
        Consequent {
            bias,
            weights: [0.0; FEATURE_COUNT],
        }
    }

    /// Straightforward f64 evaluation used as a cross-check
    fn reference_scores(json: &serde_json::Value, raw: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let f = |v: &serde_json::Value| v.as_f64().unwrap();
        let x: Vec<f64> = (0..FEATURE_COUNT)
            .map(|i| (raw[i] - f(&json["scaler_mean"][i])) / f(&json["scaler_scale"][i]))
            .collect();
        let rules = json["rules"]["index"].as_array().unwrap();
        let weights: Vec<f64> = rules
            .iter()
            .map(|rule| {
                (0..FEATURE_COUNT)
                    .map(|i| {
                        let m = rule[i].as_u64().unwrap() as usize;
                        let z = (x[i] - f(&json["premise"]["center"][i][m]))
                            / f(&json["premise"]["sigma"][i][m]);
                        (-0.5 * z * z).exp()
                    })
                    .product::<f64>()
            })
            .collect();
        let w_sum: f64 = weights.iter().sum();

        json["consequents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|rows| {
                let numerator: f64 = rows
                    .as_array()
                    .unwrap()
                    .iter()
                    .zip(&weights)
                    .map(|(row, w)| {
                        let y = f(&row[0]) + (0..FEATURE_COUNT).map(|i| f(&row[i + 1]) * x[i]).sum::<f64>();
                        w * y
                    })
                    .sum();
                numerator / w_sum
            })
            .collect()
    }

    #[test]
    fn test_gauss_membership() {
        assert_eq!(gauss_membership(2.0, 2.0, 0.5), 1.0);
        assert_abs_diff_eq!(gauss_membership(1.0, 0.0, 1.0), (-0.5f32).exp(), epsilon = 1e-7);
        assert!(gauss_membership(3.0, 0.0, 1.0) < gauss_membership(2.0, 0.0, 1.0));
        assert!(gauss_membership(5.0, 0.0, 1.0) > 0.0);
    }

    #[test]
    fn test_exact_match_at_rule_center() {
        let x = [0.5f32, -1.25, 2.0, 0.75, -0.5, 1.5];
        let mut center = [[0.0f32; 2]; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            center[i][0] = x[i];
        }
        let cons = Consequent {
            bias: 0.3,
            weights: [0.1, 0.2, -0.3, 0.4, -0.5, 0.6],
        };
        let params = model(
            1,
            identity_scaler(),
            Premise {
                center,
                sigma: [[0.7, 0.7]; FEATURE_COUNT],
            },
            vec![[0; FEATURE_COUNT]],
            vec![vec![cons]],
        );

        let prediction = predict(&params, &x, false);

        let mut expected = cons.bias;
        for i in 0..FEATURE_COUNT {
            expected += cons.weights[i] * x[i];
        }
        assert_eq!(prediction.class_index, 0);
        assert!(!prediction.degenerate);
        assert_abs_diff_eq!(prediction.scores[0], expected, epsilon = 1e-6);
    }

    #[test]
    fn test_matches_reference_evaluation() {
        let json = sample_model_json();
        let params = sample_model();

        for raw in [
            [12.0f32, 18.0, 1.0, -4.0, 0.5, 20.0],
            [5.0, 25.0, -2.0, -9.0, 1.5, 10.0],
            [10.0, 20.0, 0.0, -5.0, 0.0, 15.0],
        ] {
            let raw64 = raw.map(f64::from);
            let expected = reference_scores(&json, &raw64);
            let prediction = predict(&params, &raw, false);

            for (got, want) in prediction.scores.iter().zip(&expected) {
                assert_abs_diff_eq!(*got as f64, *want, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_degenerate_firing() {
        let params = model(
            3,
            identity_scaler(),
            uniform_premise(1e-3),
            vec![[0; FEATURE_COUNT], [1; FEATURE_COUNT]],
            vec![
                vec![bias_only(1.0), bias_only(2.0)],
                vec![bias_only(-3.0), bias_only(4.0)],
                vec![bias_only(5.0), bias_only(6.0)],
            ],
        );
        let raw = [100.0f32; FEATURE_COUNT];

        let plain = predict(&params, &raw, false);
        assert!(plain.degenerate);
        assert_eq!(plain.scores, vec![0.0, 0.0, 0.0]);
        assert_eq!(plain.class_index, 0);

        let soft = predict(&params, &raw, true);
        assert!(soft.degenerate);
        for s in &soft.scores {
            assert_abs_diff_eq!(*s, 1.0 / 3.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(soft.scores.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_eq!(soft.class_index, 0);
    }

    #[test]
    fn test_softmax_normalization() {
        let params = sample_model();
        let prediction = predict(&params, &[12.0, 18.0, 1.0, -4.0, 0.5, 20.0], true);

        assert!(!prediction.degenerate);
        assert!(prediction.softmax_applied);
        assert_abs_diff_eq!(prediction.scores.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_eq!(prediction.class_index, argmax(&prediction.scores));
    }

    #[test]
    fn test_softmax_preserves_argmax() {
        let params = sample_model();
        let raw = [5.0f32, 25.0, -2.0, -9.0, 1.5, 10.0];

        assert_eq!(
            predict(&params, &raw, false).class_index,
            predict(&params, &raw, true).class_index
        );
    }

    #[test]
    fn test_tie_break_prefers_lower_index() {
        let params = model(
            3,
            identity_scaler(),
            uniform_premise(1.0),
            vec![[0; FEATURE_COUNT]],
            vec![vec![bias_only(0.5)], vec![bias_only(2.0)], vec![bias_only(2.0)]],
        );

        let prediction = predict(&params, &[0.0; FEATURE_COUNT], false);
        assert_eq!(prediction.scores[1], prediction.scores[2]);
        assert_eq!(prediction.class_index, 1);

        let prediction = predict(&params, &[0.0; FEATURE_COUNT], true);
        assert_eq!(prediction.class_index, 1);
    }

    #[test]
    fn test_reparametrization_invariance() {
        let json = sample_model_json();
        let mut shifted = json.clone();
        shifted["scaler_mean"] = serde_json::json!([2.0, -4.0, 8.0, 0.5, 1.0, -3.0]);
        shifted["scaler_scale"] = serde_json::json!([0.5, 2.0, 4.0, 1.0, 8.0, 0.25]);

        let loader = ModelLoader::new();
        let a = loader.parse(json.to_string().as_bytes()).unwrap();
        let b = loader.parse(shifted.to_string().as_bytes()).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            // Dyadic rationals keep both normalizations exact
            let x: [f32; FEATURE_COUNT] =
                std::array::from_fn(|_| rng.gen_range(-32..32) as f32 / 16.0);
            let raw_a: [f32; FEATURE_COUNT] =
                std::array::from_fn(|i| x[i] * a.scaler().scale[i] + a.scaler().mean[i]);
            let raw_b: [f32; FEATURE_COUNT] =
                std::array::from_fn(|i| x[i] * b.scaler().scale[i] + b.scaler().mean[i]);

            for softmax in [false, true] {
                assert_eq!(predict(&a, &raw_a, softmax), predict(&b, &raw_b, softmax));
            }
        }
    }

    #[test]
    fn test_nan_propagation() {
        let params = sample_model();
        let raw = [f32::NAN, 0.0, 0.0, 0.0, 0.0, 0.0];

        for softmax in [false, true] {
            let prediction = predict(&params, &raw, softmax);
            assert_eq!(prediction.class_index, 0);
            assert!(prediction.scores.iter().all(|s| s.is_nan()));
            assert!(prediction.is_nan_poisoned());
            assert!(!prediction.degenerate);
        }
    }

    #[test]
    fn test_infinite_input_is_degenerate() {
        let params = sample_model();
        let raw = [f32::INFINITY, 0.0, 0.0, 0.0, 0.0, 0.0];

        let prediction = predict(&params, &raw, false);
        assert!(prediction.degenerate);
        assert_eq!(prediction.scores, vec![0.0, 0.0]);

        let prediction = predict(&params, &raw, true);
        assert_eq!(prediction.scores, vec![0.5, 0.5]);
        assert_eq!(prediction.class_index, 0);
    }

    #[test]
    fn test_prediction_helpers() {
        let prediction = Prediction {
            class_index: 2,
            scores: vec![0.1, 0.3, 0.6],
            degenerate: false,
            softmax_applied: true,
        };

        assert_eq!(prediction.confidence(), 0.6);
        assert!(!prediction.is_nan_poisoned());
        assert_eq!(prediction.ranked(2), vec![2, 1]);
    }

    #[test]
    fn test_engine_without_model() {
        let engine = InferenceEngine::with_handle(Arc::new(ModelHandle::new()), true);

        assert_eq!(
            engine.predict(&[0.0; FEATURE_COUNT]),
            Err(PredictionError::ModelNotLoaded)
        );
        assert_eq!(
            engine.predict_batch(&[[0.0; FEATURE_COUNT]]),
            Err(PredictionError::ModelNotLoaded)
        );
    }

    #[test]
    fn test_engine_predict_batch() {
        let engine = InferenceEngine::with_handle(Arc::new(ModelHandle::with_model(sample_model())), true);
        let batch = [
            [12.0f32, 18.0, 1.0, -4.0, 0.5, 20.0],
            [5.0, 25.0, -2.0, -9.0, 1.5, 10.0],
        ];

        let predictions = engine.predict_batch(&batch).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[1], engine.predict(&batch[1]).unwrap());
        assert!(engine.apply_softmax());

        let (model, prediction) = engine.predict_with_model(&batch[0]).unwrap();
        assert_eq!(prediction, predictions[0]);
        assert!(Arc::ptr_eq(&model, &engine.handle().snapshot().unwrap()));
        assert_ne!(engine.predict_with(&batch[0], false).unwrap(), prediction);
    }

    #[test]
    fn test_engine_new_from_config() {
        let path = std::env::temp_dir().join(format!("anfis-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, sample_model_json().to_string()).unwrap();

        let mut config = AppConfig::default();
        config.model.path = path.display().to_string();
        config.model.apply_softmax = false;

        let engine = InferenceEngine::new(&config).unwrap();
        assert!(!engine.apply_softmax());
        assert_eq!(engine.predict(&[0.0; FEATURE_COUNT]).unwrap().scores.len(), 2);

        std::fs::remove_file(&path).unwrap();
        assert!(InferenceEngine::new(&config).is_err());
    }

    #[test]
    fn test_engine_new_honors_configured_size_limit() {
        let path = std::env::temp_dir().join(format!("anfis-{}.json", uuid::Uuid::new_v4()));
        let json = sample_model_json().to_string();
        std::fs::write(&path, &json).unwrap();

        let mut config = AppConfig::default();
        config.model.path = path.display().to_string();

        config.model.max_bytes = Some(json.len() - 1);
        let err = InferenceEngine::new(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MalformedInput(_))
        ));

        config.model.max_bytes = Some(json.len());
        assert!(InferenceEngine::new(&config).is_ok());

        std::fs::remove_file(&path).unwrap();
    }
}
