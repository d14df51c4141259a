use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub ledger: LedgerConfig,
    pub scoring: ScoringConfig,
    pub selector: SelectorConfig,
    pub blender: BlenderConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "personalization-service".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Maximum retained interaction records (FIFO by insertion order)
    pub max_records: usize,
    /// Upper bound for a single view-time measurement; values above this
    /// (or non-positive values) are treated as measurement noise
    pub max_view_time_ms: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_records: 100,
            max_view_time_ms: 300_000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Minimum ledger window size before either strategy emits weights
    pub min_interactions: usize,
    /// Explicit signal weights
    pub like_weight: f64,
    pub interested_weight: f64,
    pub not_interested_weight: f64,
    pub comment_weight: f64,
    /// Assumed content duration when the item does not report one
    pub default_duration_ms: f64,
    /// Heuristic blend of per-name average vs window-normalized total
    pub avg_share: f64,
    pub total_share: f64,
    /// Class thresholds for the learned strategy's training labels
    pub engaged_threshold: f64,
    pub disengaged_threshold: f64,
    /// Retained snapshot entries above this weight seed synthetic
    /// engaged training rows
    pub snapshot_seed_threshold: f64,
    /// Classifier shape and fit parameters
    pub hidden_one: usize,
    pub hidden_two: usize,
    pub learning_rate: f32,
    pub epochs: usize,
    pub l2_penalty: f32,
    /// Fixed RNG seed for weight init (None = thread rng)
    pub init_seed: Option<u64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_interactions: 10,
            like_weight: 3.0,
            interested_weight: 2.0,
            not_interested_weight: -4.0,
            comment_weight: 1.5,
            default_duration_ms: 10_000.0,
            avg_share: 0.6,
            total_share: 0.4,
            engaged_threshold: 1.5,
            disengaged_threshold: -1.5,
            snapshot_seed_threshold: 0.3,
            hidden_one: 16,
            hidden_two: 8,
            learning_rate: 0.05,
            epochs: 40,
            l2_penalty: 1e-3,
            init_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Weights at or below this never survive selection or blending
    pub min_weight: f64,
    /// Absolute gap threshold floor
    pub gap_floor: f64,
    /// Gap threshold as a fraction of the top weight
    pub top_fraction: f64,
    /// A gap this large relative to the current weight qualifies as a split
    pub relative_gap: f64,
    /// A relative gap this large terminates the scan immediately
    pub strong_relative_gap: f64,
    /// Adjacent pairs inspected at most (scan bound on long lists)
    pub max_gap_pairs: usize,
    /// Fallback cutoff when no qualifying gap is found
    pub fallback_take: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.1,
            gap_floor: 0.1,
            top_fraction: 0.25,
            relative_gap: 0.4,
            strong_relative_gap: 0.6,
            max_gap_pairs: 10,
            fallback_take: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlenderConfig {
    /// Exponential recency base applied to retained snapshots
    pub recency_base: f64,
    /// Shares of the sequential current/prior combination
    pub current_share: f64,
    pub prior_share: f64,
    /// Prior-only names above this weight are carried over
    pub carryover_threshold: f64,
    /// Scale applied to carried-over prior weights
    pub carryover_scale: f64,
    /// Weights at or below this are dropped from the blended result
    pub min_weight: f64,
    /// Retained snapshots per domain (FIFO)
    pub max_snapshots: usize,
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            recency_base: 0.8,
            current_share: 0.7,
            prior_share: 0.3,
            carryover_threshold: 0.3,
            carryover_scale: 0.4,
            min_weight: 0.1,
            max_snapshots: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub default_limit: usize,
    /// Fraction of the limit injected as exploration noise
    pub noise_fraction: f64,
    /// Relevant pool size as a multiple of the limit
    pub pool_multiplier: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            noise_fraction: 0.3,
            pool_multiplier: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        config.service.service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "personalization-service".to_string());
        config.ledger.max_records = env::var("LEDGER_MAX_RECORDS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .expect("LEDGER_MAX_RECORDS must be a valid usize");
        config.scoring.min_interactions = env::var("SCORING_MIN_INTERACTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .expect("SCORING_MIN_INTERACTIONS must be a valid usize");
        config.gateway.default_limit = env::var("GATEWAY_DEFAULT_LIMIT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .expect("GATEWAY_DEFAULT_LIMIT must be a valid usize");
        config.gateway.noise_fraction = env::var("GATEWAY_NOISE_FRACTION")
            .unwrap_or_else(|_| "0.3".to_string())
            .parse()
            .expect("GATEWAY_NOISE_FRACTION must be a valid f64");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ledger.max_records, 100);
        assert_eq!(config.scoring.min_interactions, 10);
        assert_eq!(config.blender.max_snapshots, 5);
        assert_eq!(config.selector.max_gap_pairs, 10);
        assert_eq!(config.gateway.default_limit, 10);
    }
}
