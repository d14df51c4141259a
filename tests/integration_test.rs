use personalization_service::models::{
    BatchRequest, BatchResponse, EngagementKind, FeedItem, PreferencePayload,
};
use personalization_service::services::session::{
    BatchSource, InMemorySnapshotStore, LocalBatchSource,
};
use personalization_service::{Config, FeedSession, RankingGateway};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn corpus() -> Vec<FeedItem> {
    let mut items = Vec::new();
    for i in 0..15 {
        items.push(FeedItem {
            id: format!("sports-{}", i),
            topics: vec!["sports".to_string()],
            hashtags: vec!["#game".to_string()],
            duration_ms: Some(10_000.0),
            created_at: i,
        });
    }
    for i in 0..15 {
        items.push(FeedItem {
            id: format!("news-{}", i),
            topics: vec!["news".to_string()],
            hashtags: vec!["#world".to_string()],
            duration_ms: Some(10_000.0),
            created_at: i,
        });
    }
    for i in 0..20 {
        items.push(FeedItem {
            id: format!("misc-{}", i),
            topics: vec!["misc".to_string()],
            hashtags: vec![],
            duration_ms: Some(10_000.0),
            created_at: i,
        });
    }
    items
}

struct FailingSource;

#[async_trait]
impl BatchSource for FailingSource {
    async fn fetch_batch(&self, _request: BatchRequest) -> anyhow::Result<BatchResponse> {
        Err(anyhow::anyhow!("gateway unreachable"))
    }
}

#[tokio::test]
async fn test_full_personalization_loop() {
    init_tracing();

    let corpus = corpus();
    let source = Arc::new(LocalBatchSource::new(
        RankingGateway::new(Config::default().gateway),
        corpus.clone(),
    ));
    let store = Arc::new(InMemorySnapshotStore::default());
    let mut session = FeedSession::new(Config::default(), source, Some(store.clone()));
    session.restore().await;

    // Engage positively with sports, negatively with news
    for i in 0..6 {
        session.record_engagement(&corpus[i], EngagementKind::Like);
    }
    for i in 15..20 {
        session.record_engagement(&corpus[i], EngagementKind::NotInterested);
    }

    let profile = session.refresh_interests().await;
    assert!(!profile.topics.is_empty());
    assert_eq!(profile.topics[0].name, "sports");
    assert!(profile.topics.iter().all(|w| w.weight > 0.1));
    assert!(profile.topics.iter().all(|w| w.name != "news"));

    // The snapshot drives the next batch toward sports without locking
    // out exploration entirely
    let batch = session.next_batch().await;
    assert_eq!(batch.items.len(), 10);
    assert_eq!(batch.total, 50);

    let sports_count = batch
        .items
        .iter()
        .filter(|item| item.topics.contains(&"sports".to_string()))
        .count();
    assert!(sports_count >= 7, "expected mostly sports, got {}", sports_count);

    let unique: HashSet<&str> = batch.items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(unique.len(), batch.items.len());

    // Served items re-enter the pipeline as viewable vocabulary
    assert!(session.vocabulary().topic_count() >= 2);
}

#[tokio::test]
async fn test_snapshots_survive_across_sessions() {
    let corpus = corpus();
    let store = Arc::new(InMemorySnapshotStore::default());

    {
        let source = Arc::new(LocalBatchSource::new(
            RankingGateway::new(Config::default().gateway),
            corpus.clone(),
        ));
        let mut session = FeedSession::new(Config::default(), source, Some(store.clone()));
        for i in 0..10 {
            session.record_engagement(&corpus[i], EngagementKind::Like);
        }
        session.refresh_interests().await;
    }

    let source = Arc::new(LocalBatchSource::new(
        RankingGateway::new(Config::default().gateway),
        corpus.clone(),
    ));
    let mut next_session = FeedSession::new(Config::default(), source, Some(store));
    next_session.restore().await;
    assert_eq!(next_session.topic_history().len(), 1);

    // A weaker fresh signal still blends against the restored history
    for i in 0..10 {
        next_session.accrue_view_time(&corpus[i], 8_000.0);
    }
    let profile = next_session.refresh_interests().await;
    assert_eq!(profile.topics[0].name, "sports");
}

#[tokio::test]
async fn test_gateway_failure_never_reaches_the_caller() {
    let mut session = FeedSession::new(Config::default(), Arc::new(FailingSource), None);

    let batch = session.next_batch().await;
    assert!(batch.items.is_empty());
    assert_eq!(batch.limit, 10);
    assert_eq!(session.cursor(), 0);
}

#[tokio::test]
async fn test_learned_strategy_takes_over_after_training() {
    let corpus = corpus();
    let source = Arc::new(LocalBatchSource::new(
        RankingGateway::new(Config::default().gateway),
        corpus.clone(),
    ));
    let mut config = Config::default();
    config.scoring.init_seed = Some(11);
    let mut session = FeedSession::new(config, source, None);

    for i in 0..6 {
        session.record_engagement(&corpus[i], EngagementKind::Like);
    }
    for i in 15..21 {
        session.record_engagement(&corpus[i], EngagementKind::NotInterested);
    }

    // Two concurrent triggers share one underlying fit
    let first = session.train_classifier();
    let second = session.train_classifier();
    let (a, b) = tokio::join!(first, second);
    assert!(a && b);
    assert_eq!(session.train_runs(), 1);

    let profile = session.refresh_interests().await;
    assert_eq!(profile.topics[0].name, "sports");
    assert!(profile.topics.iter().all(|w| w.weight > 0.1));
}

#[tokio::test]
async fn test_insufficient_signal_yields_empty_snapshot() {
    let corpus = corpus();
    let source = Arc::new(LocalBatchSource::new(
        RankingGateway::new(Config::default().gateway),
        corpus.clone(),
    ));
    let mut session = FeedSession::new(Config::default(), source, None);

    for i in 0..5 {
        session.record_engagement(&corpus[i], EngagementKind::Like);
    }

    let profile = session.refresh_interests().await;
    assert!(profile.is_empty());

    // An empty snapshot means the next request carries no preferences
    // and the gateway samples from the whole corpus
    let batch = session.next_batch().await;
    assert_eq!(batch.items.len(), 10);
    assert_eq!(batch.total, 50);
}

#[test]
fn test_malformed_preference_payload_is_never_rejected() {
    let payload = PreferencePayload::parse(Some("{not json"));
    match payload {
        PreferencePayload::NamesOnly(names) => assert_eq!(names, vec!["{not json".to_string()]),
        other => panic!("expected legacy fallback, got {:?}", other),
    }
}
