// ============================================
// Learned Scorer
// ============================================
//
// Online-trained scoring strategy. Each training pass discretizes the
// ledger window into {disengaged, neutral, engaged} labels, optionally
// seeds synthetic engaged rows from retained snapshots, and fits a fresh
// classifier sized to the current topic vocabulary.
//
// Training is single-flight: one fit runs system-wide at a time and a
// second trigger awaits the same completion instead of starting a
// parallel pass. A failed fit reverts to not-in-progress without
// advancing the trained flag and never panics the caller.

use super::model::EngagementClassifier;
use super::{discretize, preference_score, EngagementClass, ScoringError};
use crate::config::ScoringConfig;
use crate::models::{InteractionRecord, InterestProfile, PreferenceWeight, WeightDomain};
use crate::utils::sort_by_weight_desc;
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// One labeled training row. Confidence scales the fit gradient.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub features: Vec<f32>,
    pub class: EngagementClass,
    pub confidence: f32,
}

struct ModelState {
    classifier: Option<EngagementClassifier>,
    /// Topic vocabulary the classifier was fitted against; inference
    /// vectors are built against this snapshot, not the live vocabulary.
    vocab: Vec<String>,
    trained: bool,
    train_runs: u32,
}

type TrainFuture = Shared<BoxFuture<'static, bool>>;

#[derive(Clone)]
pub struct LearnedScorer {
    config: ScoringConfig,
    state: Arc<RwLock<ModelState>>,
    in_flight: Arc<tokio::sync::Mutex<Option<TrainFuture>>>,
}

impl LearnedScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ModelState {
                classifier: None,
                vocab: Vec::new(),
                trained: false,
                train_runs: 0,
            })),
            in_flight: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Whether a trained model is available for inference.
    pub fn is_ready(&self) -> bool {
        self.state.read().expect("model state lock poisoned").trained
    }

    /// Completed training passes (successful fits only).
    pub fn train_runs(&self) -> u32 {
        self.state
            .read()
            .expect("model state lock poisoned")
            .train_runs
    }

    /// Run a training pass, or attach to the one already in flight.
    /// Returns true when this completion left a trained model behind.
    pub async fn train(&self, topic_vocab: Vec<String>, samples: Vec<TrainingSample>) -> bool {
        if samples.is_empty() || topic_vocab.is_empty() {
            debug!("Skipping training: no samples or empty vocabulary");
            return false;
        }

        let fut = {
            let mut slot = self.in_flight.lock().await;
            if let Some(existing) = slot.as_ref() {
                debug!("Training already in flight, attaching to its completion");
                existing.clone()
            } else {
                let fut = self.start_training(topic_vocab, samples);
                *slot = Some(fut.clone());
                fut
            }
        };

        fut.await
    }

    fn start_training(&self, topic_vocab: Vec<String>, samples: Vec<TrainingSample>) -> TrainFuture {
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let slot = Arc::clone(&self.in_flight);

        async move {
            // The fit is CPU-bound; run it off the async runtime so
            // engagement recording stays responsive while in flight.
            let fitted = tokio::task::spawn_blocking(move || {
                fit_classifier(&config, topic_vocab.len(), &samples)
                    .map(|classifier| (classifier, topic_vocab))
            })
            .await;

            let trained_now = match fitted {
                Ok(Ok((classifier, vocab))) => {
                    let mut state = state.write().expect("model state lock poisoned");
                    state.classifier = Some(classifier);
                    state.vocab = vocab;
                    state.trained = true;
                    state.train_runs += 1;
                    info!(train_runs = state.train_runs, "Classifier training complete");
                    true
                }
                Ok(Err(e)) => {
                    // Prior trained state, if any, stays usable
                    warn!(error = %e, "Classifier training failed");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Classifier training task panicked");
                    false
                }
            };

            *slot.lock().await = None;
            trained_now
        }
        .boxed()
        .shared()
    }

    /// Score a ledger window with the trained model. Topics are probed
    /// one-hot; hashtags are probed with a topic co-occurrence indicator
    /// computed from the window. `weight = P(engaged) - P(disengaged)`.
    pub fn score_window(
        &self,
        window: &[InteractionRecord],
        hashtag_vocab: &[String],
    ) -> InterestProfile {
        if window.len() < self.config.min_interactions {
            debug!(
                window_size = window.len(),
                "Insufficient signal for learned scoring"
            );
            return InterestProfile::default();
        }

        let state = self.state.read().expect("model state lock poisoned");
        let Some(classifier) = state.classifier.as_ref().filter(|_| state.trained) else {
            debug!("Learned scorer probed before training; returning empty profile");
            return InterestProfile::default();
        };

        let dim = state.vocab.len();
        let mut topics = Vec::with_capacity(dim);
        for (index, name) in state.vocab.iter().enumerate() {
            let mut features = vec![0.0f32; dim];
            features[index] = 1.0;
            if let Some(weight) = probe(classifier, &features) {
                topics.push(PreferenceWeight::new(name.clone(), weight, WeightDomain::Topic));
            }
        }

        let mut hashtags = Vec::new();
        for name in hashtag_vocab {
            let features = cooccurrence_vector(name, &state.vocab, window);
            // A hashtag never seen alongside a known topic carries no signal
            if features.iter().all(|v| *v == 0.0) {
                continue;
            }
            if let Some(weight) = probe(classifier, &features) {
                hashtags.push(PreferenceWeight::new(
                    name.clone(),
                    weight,
                    WeightDomain::Hashtag,
                ));
            }
        }

        sort_by_weight_desc(&mut topics);
        sort_by_weight_desc(&mut hashtags);

        InterestProfile { topics, hashtags }
    }
}

fn probe(classifier: &EngagementClassifier, features: &[f32]) -> Option<f64> {
    match classifier.predict(features) {
        Ok(probs) => Some(
            (probs[EngagementClass::Engaged.index()] - probs[EngagementClass::Disengaged.index()])
                as f64,
        ),
        Err(e) => {
            warn!(error = %e, "Classifier probe failed");
            None
        }
    }
}

fn fit_classifier(
    config: &ScoringConfig,
    input_dim: usize,
    samples: &[TrainingSample],
) -> Result<EngagementClassifier, ScoringError> {
    let mut rng = match config.init_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut classifier =
        EngagementClassifier::new(input_dim, config.hidden_one, config.hidden_two, &mut rng);
    classifier.fit(
        samples,
        config.epochs,
        config.learning_rate,
        config.l2_penalty,
    )?;
    Ok(classifier)
}

/// Indicator over the topic vocabulary of topics co-occurring with the
/// given hashtag anywhere in the window.
fn cooccurrence_vector(
    hashtag: &str,
    topic_vocab: &[String],
    window: &[InteractionRecord],
) -> Vec<f32> {
    let mut features = vec![0.0f32; topic_vocab.len()];
    for record in window {
        if !record.hashtags.iter().any(|h| h == hashtag) {
            continue;
        }
        for topic in &record.topics {
            if let Some(index) = topic_vocab.iter().position(|t| t == topic) {
                features[index] = 1.0;
            }
        }
    }
    features
}

/// Discretize the ledger window into labeled one-hot training rows.
pub fn build_training_samples(
    window: &[InteractionRecord],
    topic_vocab: &[String],
    config: &ScoringConfig,
) -> Vec<TrainingSample> {
    let mut samples = Vec::with_capacity(window.len());

    for record in window {
        let score = preference_score(record, config);
        let class = discretize(score, config);

        let mut features = vec![0.0f32; topic_vocab.len()];
        let mut any = false;
        for topic in &record.topics {
            if let Some(index) = topic_vocab.iter().position(|t| t == topic) {
                features[index] = 1.0;
                any = true;
            }
        }
        if !any {
            continue;
        }

        samples.push(TrainingSample {
            features,
            class,
            confidence: 1.0,
        });
    }

    samples
}

/// Synthetic engaged rows from retained snapshot entries, biasing the
/// model toward previously important interests. Confidence scales with
/// the retained weight.
pub fn snapshot_seed_samples(
    snapshots: &[Vec<PreferenceWeight>],
    topic_vocab: &[String],
    config: &ScoringConfig,
) -> Vec<TrainingSample> {
    let mut samples = Vec::new();

    for snapshot in snapshots {
        for entry in snapshot {
            if entry.weight <= config.snapshot_seed_threshold {
                continue;
            }
            let Some(index) = topic_vocab.iter().position(|t| *t == entry.name) else {
                continue;
            };
            let mut features = vec![0.0f32; topic_vocab.len()];
            features[index] = 1.0;
            samples.push(TrainingSample {
                features,
                class: EngagementClass::Engaged,
                confidence: entry.weight.min(1.0) as f32,
            });
        }
    }

    samples
}
