pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use models::{
    BatchRequest, BatchResponse, EngagementKind, FeedItem, InterestProfile, PreferencePayload,
    PreferenceWeight, WeightDomain,
};
pub use services::{
    FeedSession, HeuristicScorer, InteractionLedger, LearnedScorer, RankSelector, RankingGateway,
    TemporalBlender,
};
