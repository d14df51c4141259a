// ============================================
// Feed Session
// ============================================
//
// Client-side pipeline orchestrator for one viewing session. Owns the
// interaction ledger, the append-only vocabulary, the retained snapshot
// history and both scoring strategies, and talks to two collaborators:
//
// - BatchSource: transport to the remote ranking gateway. A failed or
//   timed-out fetch degrades to an empty batch and resets the cursor;
//   no error escapes toward the UI.
// - SnapshotStore: best-effort string key-value persistence for the
//   snapshot history. Absence or failure degrades to session-only
//   memory.
//
// The pipeline is single-threaded cooperative; the only true
// concurrency is the classifier training pass, which runs off-task so
// engagement recording stays possible while it is in flight.

use crate::config::Config;
use crate::models::{
    BatchRequest, BatchResponse, EngagementKind, FeedItem, InterestProfile, PreferencePayload,
    PreferenceWeight, WeightedName,
};
use crate::services::blender::{SnapshotHistory, TemporalBlender};
use crate::services::gateway::RankingGateway;
use crate::services::ledger::InteractionLedger;
use crate::services::scoring::learned::{build_training_samples, snapshot_seed_samples};
use crate::services::scoring::{HeuristicScorer, LearnedScorer};
use crate::services::selector::RankSelector;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TOPIC_SNAPSHOT_KEY: &str = "interests:topics";
const HASHTAG_SNAPSHOT_KEY: &str = "interests:hashtags";

/// Transport collaborator toward the ranking gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn fetch_batch(&self, request: BatchRequest) -> anyhow::Result<BatchResponse>;
}

/// Durable snapshot collaborator: minimal string get/set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// In-memory SnapshotStore for tests and single-process consumers.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    entries: tokio::sync::Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// BatchSource backed by an in-process gateway over a local corpus.
pub struct LocalBatchSource {
    gateway: RankingGateway,
    corpus: Vec<FeedItem>,
}

impl LocalBatchSource {
    pub fn new(gateway: RankingGateway, corpus: Vec<FeedItem>) -> Self {
        Self { gateway, corpus }
    }
}

#[async_trait]
impl BatchSource for LocalBatchSource {
    async fn fetch_batch(&self, request: BatchRequest) -> anyhow::Result<BatchResponse> {
        Ok(self.gateway.select_batch(&self.corpus, &request))
    }
}

/// Append-only, de-duplicated union of every topic and hashtag name
/// observed across served items. Never shrinks. The topic side is
/// index-stable so it can size the classifier's input layer.
#[derive(Debug, Default)]
pub struct Vocabulary {
    topics: Vec<String>,
    topic_index: HashMap<String, usize>,
    hashtags: Vec<String>,
    hashtag_seen: HashSet<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_item(&mut self, item: &FeedItem) {
        for topic in &item.topics {
            if !self.topic_index.contains_key(topic) {
                self.topic_index.insert(topic.clone(), self.topics.len());
                self.topics.push(topic.clone());
            }
        }
        for hashtag in &item.hashtags {
            if self.hashtag_seen.insert(hashtag.clone()) {
                self.hashtags.push(hashtag.clone());
            }
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

pub struct FeedSession {
    session_id: Uuid,
    config: Config,
    ledger: InteractionLedger,
    vocabulary: Vocabulary,
    topic_history: SnapshotHistory,
    hashtag_history: SnapshotHistory,
    heuristic: HeuristicScorer,
    learned: LearnedScorer,
    selector: RankSelector,
    blender: TemporalBlender,
    source: Arc<dyn BatchSource>,
    store: Option<Arc<dyn SnapshotStore>>,
    cursor: usize,
}

impl FeedSession {
    pub fn new(
        config: Config,
        source: Arc<dyn BatchSource>,
        store: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        info!(session_id = %session_id, "Starting feed session");

        Self {
            session_id,
            ledger: InteractionLedger::new(config.ledger.clone()),
            vocabulary: Vocabulary::new(),
            topic_history: SnapshotHistory::new(config.blender.max_snapshots),
            hashtag_history: SnapshotHistory::new(config.blender.max_snapshots),
            heuristic: HeuristicScorer::new(config.scoring.clone()),
            learned: LearnedScorer::new(config.scoring.clone()),
            selector: RankSelector::new(config.selector.clone()),
            blender: TemporalBlender::new(config.blender.clone()),
            source,
            store,
            cursor: 0,
            config,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn ledger(&self) -> &InteractionLedger {
        &self.ledger
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn topic_history(&self) -> &SnapshotHistory {
        &self.topic_history
    }

    pub fn train_runs(&self) -> u32 {
        self.learned.train_runs()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
    }

    pub fn record_engagement(&mut self, item: &FeedItem, kind: EngagementKind) {
        self.vocabulary.observe_item(item);
        self.ledger.record_engagement(item, kind);
    }

    pub fn accrue_view_time(&mut self, item: &FeedItem, elapsed_ms: f64) {
        self.vocabulary.observe_item(item);
        self.ledger.accrue_view_time(item, elapsed_ms);
    }

    /// Restore persisted snapshot history from the store collaborator.
    /// Absence, failure or an unparsable payload degrades to session-only
    /// memory.
    pub async fn restore(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };

        self.topic_history = load_history(
            store.as_ref(),
            TOPIC_SNAPSHOT_KEY,
            self.config.blender.max_snapshots,
        )
        .await;
        self.hashtag_history = load_history(
            store.as_ref(),
            HASHTAG_SNAPSHOT_KEY,
            self.config.blender.max_snapshots,
        )
        .await;

        debug!(
            session_id = %self.session_id,
            topic_snapshots = self.topic_history.len(),
            hashtag_snapshots = self.hashtag_history.len(),
            "Restored snapshot history"
        );
    }

    /// Run one scoring cycle: score the ledger window with whichever
    /// strategy is ready, cut each list at its natural gap, blend against
    /// retained history, append the blended result as the newest snapshot
    /// and persist it best-effort.
    pub async fn refresh_interests(&mut self) -> InterestProfile {
        let window = self.ledger.window();
        let raw = if self.learned.is_ready() {
            debug!(session_id = %self.session_id, "Scoring with learned strategy");
            self.learned.score_window(window, self.vocabulary.hashtags())
        } else {
            debug!(session_id = %self.session_id, "Scoring with heuristic strategy");
            self.heuristic.score_window(window)
        };

        let topics = self
            .blender
            .blend(self.selector.select(raw.topics), &self.topic_history);
        let hashtags = self
            .blender
            .blend(self.selector.select(raw.hashtags), &self.hashtag_history);

        self.topic_history.push(topics.clone());
        self.hashtag_history.push(hashtags.clone());
        self.persist_snapshots().await;

        info!(
            session_id = %self.session_id,
            topics = topics.len(),
            hashtags = hashtags.len(),
            "Interest snapshot refreshed"
        );

        InterestProfile { topics, hashtags }
    }

    /// Trigger a classifier training pass over the current ledger window,
    /// seeded with synthetic rows from retained snapshots. The returned
    /// future owns its inputs, so the session can keep recording
    /// engagements while the fit is in flight; a concurrent trigger
    /// attaches to the same completion.
    pub fn train_classifier(&self) -> BoxFuture<'static, bool> {
        let window = self.ledger.window();
        if window.len() < self.config.scoring.min_interactions {
            debug!(
                session_id = %self.session_id,
                window_size = window.len(),
                "Insufficient signal for training"
            );
            return futures::future::ready(false).boxed();
        }

        let vocab = self.vocabulary.topics().to_vec();
        let mut samples = build_training_samples(window, &vocab, &self.config.scoring);
        samples.extend(snapshot_seed_samples(
            &self.topic_history.to_vec(),
            &vocab,
            &self.config.scoring,
        ));

        let learned = self.learned.clone();
        async move { learned.train(vocab, samples).await }.boxed()
    }

    /// Request the next batch, carrying the latest blended interests as a
    /// weighted preference payload. A fetch failure degrades to an empty
    /// batch and resets the cursor to the start; it never surfaces an
    /// error to the caller.
    pub async fn next_batch(&mut self) -> BatchResponse {
        let limit = self.config.gateway.default_limit;
        let request = BatchRequest {
            limit,
            topics: payload_from(self.topic_history.latest()),
            hashtags: payload_from(self.hashtag_history.latest()),
        };

        match self.source.fetch_batch(request).await {
            Ok(batch) => {
                for item in &batch.items {
                    self.vocabulary.observe_item(item);
                }
                self.cursor = 0;
                batch
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "Batch fetch failed, degrading to empty batch"
                );
                self.cursor = 0;
                BatchResponse::empty(limit)
            }
        }
    }

    async fn persist_snapshots(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        for (key, history) in [
            (TOPIC_SNAPSHOT_KEY, &self.topic_history),
            (HASHTAG_SNAPSHOT_KEY, &self.hashtag_history),
        ] {
            let payload = match serde_json::to_string(&history.to_vec()) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, key = key, "Failed to encode snapshot history");
                    continue;
                }
            };
            if let Err(e) = store.set(key, &payload).await {
                // Persistence is best-effort; in-session blending continues
                warn!(error = %e, key = key, "Failed to persist snapshot history");
            }
        }
    }
}

fn payload_from(snapshot: Option<&Vec<PreferenceWeight>>) -> PreferencePayload {
    match snapshot {
        Some(entries) if !entries.is_empty() => PreferencePayload::Weighted(
            entries
                .iter()
                .map(|entry| WeightedName {
                    name: entry.name.clone(),
                    weight: entry.weight,
                })
                .collect(),
        ),
        _ => PreferencePayload::Empty,
    }
}

async fn load_history(store: &dyn SnapshotStore, key: &str, cap: usize) -> SnapshotHistory {
    let mut history = SnapshotHistory::new(cap);

    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return history,
        Err(e) => {
            warn!(error = %e, key = key, "Snapshot store unavailable, using session-only memory");
            return history;
        }
    };

    match serde_json::from_str::<Vec<Vec<PreferenceWeight>>>(&raw) {
        Ok(snapshots) => {
            for snapshot in snapshots {
                history.push(snapshot);
            }
        }
        Err(e) => {
            warn!(error = %e, key = key, "Ignoring unparsable snapshot history");
        }
    }

    history
}
