// ============================================
// Preference Scorer
// ============================================
//
// Converts a ledger window into weighted interest lists via two
// interchangeable strategies:
// - Heuristic: closed-form aggregation of per-record preference scores
// - Learned: small online-trained engagement classifier
//
// Both share the per-record preference score:
//   +3.0 like, +2.0 interested, -4.0 not interested, +1.5 comment;
//   with no explicit signal, the dwell ratio contributes
//   (time_spent / duration - 0.5) * 2.
//
// A window below `min_interactions` yields empty lists from either
// strategy; that is "insufficient signal", not an error.

pub mod heuristic;
pub mod learned;
pub mod model;

pub use heuristic::HeuristicScorer;
pub use learned::{LearnedScorer, TrainingSample};
pub use model::EngagementClassifier;

use crate::config::ScoringConfig;
use crate::models::InteractionRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Training failed: {0}")]
    TrainingFailed(String),
}

pub type Result<T> = std::result::Result<T, ScoringError>;

/// Engagement class predicted by the learned strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementClass {
    Disengaged,
    Neutral,
    Engaged,
}

impl EngagementClass {
    pub const COUNT: usize = 3;

    pub fn index(&self) -> usize {
        match self {
            EngagementClass::Disengaged => 0,
            EngagementClass::Neutral => 1,
            EngagementClass::Engaged => 2,
        }
    }
}

/// Per-record preference score shared by both scoring strategies.
pub fn preference_score(record: &InteractionRecord, config: &ScoringConfig) -> f64 {
    let mut score = 0.0;

    if record.liked {
        score += config.like_weight;
    }
    if record.interested {
        score += config.interested_weight;
    }
    if record.not_interested {
        score += config.not_interested_weight;
    }
    if record.commented {
        score += config.comment_weight;
    }

    if !record.has_explicit_signal() {
        // Implicit dwell-time signal: half the content duration is neutral
        let duration = record
            .duration_ms
            .filter(|d| *d > 0.0)
            .unwrap_or(config.default_duration_ms);
        let ratio = record.time_spent_ms / duration;
        score += (ratio - 0.5) * 2.0;
    }

    score
}

/// Discretize a preference score into a training label.
pub fn discretize(score: f64, config: &ScoringConfig) -> EngagementClass {
    if score <= config.disengaged_threshold {
        EngagementClass::Disengaged
    } else if score >= config.engaged_threshold {
        EngagementClass::Engaged
    } else {
        EngagementClass::Neutral
    }
}
