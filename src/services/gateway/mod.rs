// ============================================
// Remote Ranking Gateway
// ============================================
//
// Stateless per request; safe for unbounded parallel invocation. Given a
// read-only corpus and a parsed batch request:
//
// 1. Build the relevant pool — weighted scoring (top 2*limit of items
//    with positive score), legacy any-name match, or the whole corpus
// 2. Inject exploration noise: floor(limit * 0.3) items drawn uniformly
//    without replacement from the complement of the pool
// 3. Shuffle the combined pool and truncate to the limit
//
// The shuffle is intentional: no relevance ordering survives into the
// final batch, which avoids staleness and filter-bubble lock-in.
//
// Authentication is a pre-condition handled by the transport
// collaborator; requests reaching this layer are already verified.

use crate::config::GatewayConfig;
use crate::models::{BatchRequest, BatchResponse, FeedItem};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::debug;

enum RelevanceMode {
    Weighted {
        topics: HashMap<String, f64>,
        hashtags: HashMap<String, f64>,
    },
    Names {
        topics: HashSet<String>,
        hashtags: HashSet<String>,
    },
    All,
}

pub struct RankingGateway {
    config: GatewayConfig,
}

impl RankingGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Select a batch using the caller's thread-local RNG.
    pub fn select_batch(&self, corpus: &[FeedItem], request: &BatchRequest) -> BatchResponse {
        self.select_batch_with(corpus, request, &mut rand::thread_rng())
    }

    /// Select a batch with an explicit RNG (deterministic in tests).
    pub fn select_batch_with<R: Rng>(
        &self,
        corpus: &[FeedItem],
        request: &BatchRequest,
        rng: &mut R,
    ) -> BatchResponse {
        let limit = if request.limit > 0 {
            request.limit
        } else {
            self.config.default_limit
        };

        let relevant = self.relevant_pool(corpus, request, limit);

        let pool_ids: HashSet<&str> = relevant.iter().map(|item| item.id.as_str()).collect();
        let complement: Vec<&FeedItem> = corpus
            .iter()
            .filter(|item| !pool_ids.contains(item.id.as_str()))
            .collect();

        let noise_count = (limit as f64 * self.config.noise_fraction).floor() as usize;
        let noise: Vec<&FeedItem> = complement
            .choose_multiple(rng, noise_count)
            .copied()
            .collect();

        debug!(
            relevant = relevant.len(),
            noise = noise.len(),
            limit = limit,
            corpus = corpus.len(),
            "Gateway batch selection"
        );

        let mut pool = relevant;
        pool.extend(noise);
        pool.shuffle(rng);
        pool.truncate(limit);

        BatchResponse {
            items: pool.into_iter().cloned().collect(),
            limit,
            total: corpus.len(),
        }
    }

    fn relevant_pool<'a>(
        &self,
        corpus: &'a [FeedItem],
        request: &BatchRequest,
        limit: usize,
    ) -> Vec<&'a FeedItem> {
        match relevance_mode(request) {
            RelevanceMode::Weighted { topics, hashtags } => {
                let mut scored: Vec<(&FeedItem, f64)> = corpus
                    .iter()
                    .filter_map(|item| {
                        let score = item_score(item, &topics, &hashtags);
                        (score > 0.0).then_some((item, score))
                    })
                    .collect();

                scored.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                });
                scored.truncate(limit * self.config.pool_multiplier);
                scored.into_iter().map(|(item, _)| item).collect()
            }
            RelevanceMode::Names { topics, hashtags } => corpus
                .iter()
                .filter(|item| {
                    item.topics.iter().any(|t| topics.contains(t))
                        || item.hashtags.iter().any(|h| hashtags.contains(h))
                })
                .collect(),
            RelevanceMode::All => corpus.iter().collect(),
        }
    }
}

fn relevance_mode(request: &BatchRequest) -> RelevanceMode {
    if request.topics.is_empty() && request.hashtags.is_empty() {
        return RelevanceMode::All;
    }

    if request.topics.is_weighted() || request.hashtags.is_weighted() {
        // Legacy names in the other domain fold in at their implied weight
        return RelevanceMode::Weighted {
            topics: request.topics.weight_map(),
            hashtags: request.hashtags.weight_map(),
        };
    }

    RelevanceMode::Names {
        topics: request.topics.weight_map().into_keys().collect(),
        hashtags: request.hashtags.weight_map().into_keys().collect(),
    }
}

/// Missing names contribute zero.
fn item_score(
    item: &FeedItem,
    topics: &HashMap<String, f64>,
    hashtags: &HashMap<String, f64>,
) -> f64 {
    let topic_score: f64 = item
        .topics
        .iter()
        .filter_map(|t| topics.get(t))
        .sum();
    let hashtag_score: f64 = item
        .hashtags
        .iter()
        .filter_map(|h| hashtags.get(h))
        .sum();
    topic_score + hashtag_score
}
