// ============================================
// Heuristic Scorer
// ============================================
//
// Closed-form scoring strategy. For each name seen in the window,
// accumulate positive score mass, negative score mass (absolute), and
// occurrence count, then:
//
//   avg    = (positive - negative) / count
//   total  = positive - negative
//   weight = avg * 0.6 + (total / window_size) * 0.4
//
// Exact zeros are discarded; output is sorted descending and feeds the
// rank selector.

use super::preference_score;
use crate::config::ScoringConfig;
use crate::models::{InteractionRecord, InterestProfile, PreferenceWeight, WeightDomain};
use crate::utils::sort_by_weight_desc;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
struct NameStats {
    positive: f64,
    negative: f64,
    count: usize,
}

pub struct HeuristicScorer {
    config: ScoringConfig,
}

impl HeuristicScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a ledger window into per-domain weighted interest lists.
    /// Windows below `min_interactions` yield an empty profile.
    pub fn score_window(&self, window: &[InteractionRecord]) -> InterestProfile {
        if window.len() < self.config.min_interactions {
            debug!(
                window_size = window.len(),
                min_interactions = self.config.min_interactions,
                "Insufficient signal for heuristic scoring"
            );
            return InterestProfile::default();
        }

        let profile = InterestProfile {
            topics: self.score_domain(window, WeightDomain::Topic),
            hashtags: self.score_domain(window, WeightDomain::Hashtag),
        };

        debug!(
            topics = profile.topics.len(),
            hashtags = profile.hashtags.len(),
            "Heuristic scoring complete"
        );

        profile
    }

    fn score_domain(
        &self,
        window: &[InteractionRecord],
        domain: WeightDomain,
    ) -> Vec<PreferenceWeight> {
        let mut stats: HashMap<String, NameStats> = HashMap::new();

        for record in window {
            let score = preference_score(record, &self.config);
            let names = match domain {
                WeightDomain::Topic => &record.topics,
                WeightDomain::Hashtag => &record.hashtags,
            };

            // A name counts once per record even if the item repeats it
            let unique: HashSet<&str> = names.iter().map(String::as_str).collect();
            for name in unique {
                let entry = stats.entry(name.to_string()).or_default();
                if score >= 0.0 {
                    entry.positive += score;
                } else {
                    entry.negative += score.abs();
                }
                entry.count += 1;
            }
        }

        let window_size = window.len().max(1) as f64;
        let mut weights: Vec<PreferenceWeight> = stats
            .into_iter()
            .filter_map(|(name, stats)| {
                let total = stats.positive - stats.negative;
                let avg = if stats.count > 0 {
                    total / stats.count as f64
                } else {
                    0.0
                };
                let weight =
                    avg * self.config.avg_share + (total / window_size) * self.config.total_share;

                if weight == 0.0 {
                    return None;
                }
                Some(PreferenceWeight::new(name, weight, domain))
            })
            .collect();

        sort_by_weight_desc(&mut weights);
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::models::{EngagementKind, FeedItem};
    use crate::services::ledger::InteractionLedger;

    fn tagged_item(id: &str, topic: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            topics: vec![topic.to_string()],
            hashtags: vec![format!("#{}", topic)],
            duration_ms: Some(10_000.0),
            created_at: 0,
        }
    }

    #[test]
    fn test_insufficient_signal_returns_empty() {
        let scorer = HeuristicScorer::new(ScoringConfig::default());
        let mut ledger = InteractionLedger::new(LedgerConfig::default());

        for i in 0..9 {
            ledger.record_engagement(&tagged_item(&format!("i{}", i), "sports"), EngagementKind::Like);
        }

        let profile = scorer.score_window(ledger.window());
        assert!(profile.is_empty());
    }

    #[test]
    fn test_liked_topic_ranks_above_low_dwell_topic() {
        // 6 liked sports records (score 3.0 each) and 4 news records with
        // 1000ms dwell over 10000ms duration (score -0.8 each).
        let scorer = HeuristicScorer::new(ScoringConfig::default());
        let mut ledger = InteractionLedger::new(LedgerConfig::default());

        for i in 0..6 {
            ledger.record_engagement(&tagged_item(&format!("s{}", i), "sports"), EngagementKind::Like);
        }
        for i in 0..4 {
            ledger.accrue_view_time(&tagged_item(&format!("n{}", i), "news"), 1_000.0);
        }

        let profile = scorer.score_window(ledger.window());

        let sports = profile.topics.iter().find(|w| w.name == "sports").unwrap();
        // avg 3.0, total 18.0 over window 10: 3.0*0.6 + 1.8*0.4 = 2.52
        assert!((sports.weight - 2.52).abs() < 1e-9);
        assert!(sports.weight > 0.1);

        // news is negative: avg -0.8, total -3.2/10: -0.8*0.6 + -0.32*0.4 = -0.608
        let news = profile.topics.iter().find(|w| w.name == "news").unwrap();
        assert!(news.weight < 0.0);
        assert!(sports.weight > news.weight);

        // Descending order
        assert_eq!(profile.topics[0].name, "sports");
    }

    #[test]
    fn test_exact_zero_weights_are_discarded() {
        let scorer = HeuristicScorer::new(ScoringConfig::default());
        let mut ledger = InteractionLedger::new(LedgerConfig::default());

        // Neutral dwell: 5000ms of 10000ms → score 0.0 per record
        for i in 0..10 {
            ledger.accrue_view_time(&tagged_item(&format!("i{}", i), "ambient"), 5_000.0);
        }

        let profile = scorer.score_window(ledger.window());
        assert!(profile.topics.is_empty());
    }

    #[test]
    fn test_hashtags_scored_independently() {
        let scorer = HeuristicScorer::new(ScoringConfig::default());
        let mut ledger = InteractionLedger::new(LedgerConfig::default());

        for i in 0..10 {
            ledger.record_engagement(&tagged_item(&format!("i{}", i), "sports"), EngagementKind::Like);
        }

        let profile = scorer.score_window(ledger.window());
        assert_eq!(profile.hashtags.len(), 1);
        assert_eq!(profile.hashtags[0].name, "#sports");
        assert_eq!(profile.hashtags[0].domain, WeightDomain::Hashtag);
    }
}
