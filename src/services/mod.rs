pub mod blender;
pub mod gateway;
pub mod ledger;
pub mod scoring;
pub mod selector;
pub mod session;

pub use blender::{SnapshotHistory, TemporalBlender};
pub use gateway::RankingGateway;
pub use ledger::InteractionLedger;
pub use scoring::{HeuristicScorer, LearnedScorer};
pub use selector::RankSelector;
pub use session::{BatchSource, FeedSession, InMemorySnapshotStore, LocalBatchSource, SnapshotStore, Vocabulary};
