// ============================================
// Engagement Classifier
// ============================================
//
// Small feed-forward classifier over {disengaged, neutral, engaged}.
// Input is a one-hot (or co-occurrence indicator) vector over the topic
// vocabulary; two ReLU hidden layers with L2 weight regularization and a
// softmax output. Fitted per session with plain SGD over weighted
// samples; no model files are loaded from disk.

use super::{EngagementClass, Result, ScoringError, TrainingSample};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;

pub struct EngagementClassifier {
    w1: Array2<f32>,
    b1: Array1<f32>,
    w2: Array2<f32>,
    b2: Array1<f32>,
    w3: Array2<f32>,
    b3: Array1<f32>,
    input_dim: usize,
}

impl EngagementClassifier {
    /// Create an untrained classifier for the given input dimension.
    pub fn new<R: Rng>(input_dim: usize, hidden_one: usize, hidden_two: usize, rng: &mut R) -> Self {
        Self {
            w1: init_weights(hidden_one, input_dim, rng),
            b1: Array1::zeros(hidden_one),
            w2: init_weights(hidden_two, hidden_one, rng),
            b2: Array1::zeros(hidden_two),
            w3: init_weights(EngagementClass::COUNT, hidden_two, rng),
            b3: Array1::zeros(EngagementClass::COUNT),
            input_dim,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Class probabilities `[disengaged, neutral, engaged]` for one input.
    pub fn predict(&self, features: &[f32]) -> Result<[f32; EngagementClass::COUNT]> {
        if features.len() != self.input_dim {
            return Err(ScoringError::InvalidInput(format!(
                "Expected {} features, got {}",
                self.input_dim,
                features.len()
            )));
        }

        let x = Array1::from_iter(features.iter().copied());
        let (_, _, _, _, probs) = self.forward(&x);

        let mut out = [0.0; EngagementClass::COUNT];
        for (slot, p) in out.iter_mut().zip(probs.iter()) {
            *slot = *p;
        }
        Ok(out)
    }

    /// Fit the network with per-sample SGD and cross-entropy loss.
    /// Sample confidence scales the gradient, so synthetic rows derived
    /// from retained snapshots pull proportionally to their weight.
    pub fn fit(
        &mut self,
        samples: &[TrainingSample],
        epochs: usize,
        learning_rate: f32,
        l2_penalty: f32,
    ) -> Result<()> {
        if samples.is_empty() {
            return Err(ScoringError::TrainingFailed(
                "empty training set".to_string(),
            ));
        }
        for sample in samples {
            if sample.features.len() != self.input_dim {
                return Err(ScoringError::InvalidInput(format!(
                    "Training sample has {} features, classifier expects {}",
                    sample.features.len(),
                    self.input_dim
                )));
            }
        }

        for _ in 0..epochs {
            for sample in samples {
                let x = Array1::from_iter(sample.features.iter().copied());
                let (z1, h1, z2, h2, probs) = self.forward(&x);

                // Softmax + cross-entropy gradient, scaled by confidence
                let mut delta3 = probs;
                delta3[sample.class.index()] -= 1.0;
                delta3 *= sample.confidence;

                let grad_w3 = outer(&delta3, &h2);
                let delta2 = self.w3.t().dot(&delta3) * relu_mask(&z2);
                let grad_w2 = outer(&delta2, &h1);
                let delta1 = self.w2.t().dot(&delta2) * relu_mask(&z1);
                let grad_w1 = outer(&delta1, &x);

                self.w3 = &self.w3 - learning_rate * (&grad_w3 + l2_penalty * &self.w3);
                self.b3 = &self.b3 - learning_rate * &delta3;
                self.w2 = &self.w2 - learning_rate * (&grad_w2 + l2_penalty * &self.w2);
                self.b2 = &self.b2 - learning_rate * &delta2;
                self.w1 = &self.w1 - learning_rate * (&grad_w1 + l2_penalty * &self.w1);
                self.b1 = &self.b1 - learning_rate * &delta1;
            }
        }

        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn forward(
        &self,
        x: &Array1<f32>,
    ) -> (
        Array1<f32>,
        Array1<f32>,
        Array1<f32>,
        Array1<f32>,
        Array1<f32>,
    ) {
        let z1 = self.w1.dot(x) + &self.b1;
        let h1 = z1.mapv(|v| v.max(0.0));
        let z2 = self.w2.dot(&h1) + &self.b2;
        let h2 = z2.mapv(|v| v.max(0.0));
        let z3 = self.w3.dot(&h2) + &self.b3;
        let probs = softmax(&z3);
        (z1, h1, z2, h2, probs)
    }
}

fn init_weights<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f32> {
    let scale = 1.0 / (cols.max(1) as f32).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-scale..scale))
}

fn softmax(z: &Array1<f32>) -> Array1<f32> {
    let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = z.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

fn relu_mask(z: &Array1<f32>) -> Array1<f32> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

fn outer(a: &Array1<f32>, b: &Array1<f32>) -> Array2<f32> {
    let a = a.view().insert_axis(Axis(1));
    let b = b.view().insert_axis(Axis(0));
    a.dot(&b)
}
