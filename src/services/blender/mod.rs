// ============================================
// Temporal Blender
// ============================================
//
// Merges the current scoring cycle's result with up to `max_snapshots`
// retained prior results, recency-weighted so recent sessions dominate.
//
// For the i-th of k retained snapshots the recency weight is
// `recency_base^(k-1-i)` (most recent prior weighted highest). Blending
// is applied sequentially, oldest snapshot first:
//
//   current = current * 0.7 + prior * 0.3 * recency
//
// Each later snapshot blends against the already-updated current value,
// so decay compounds across snapshots. This compounding is deliberate
// (recency reinforcement), not an accident; do not replace it with an
// independent blend against the original current value.
//
// Prior-only names above `carryover_threshold` are re-injected at
// `prior * carryover_scale * recency`.

use crate::config::BlenderConfig;
use crate::models::PreferenceWeight;
use crate::utils::sort_by_weight_desc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Retained scoring results for one domain, oldest first, FIFO-capped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotHistory {
    snapshots: VecDeque<Vec<PreferenceWeight>>,
    cap: usize,
}

impl SnapshotHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cap,
        }
    }

    /// Append the newest snapshot, evicting the oldest beyond the cap.
    pub fn push(&mut self, snapshot: Vec<PreferenceWeight>) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.cap {
            self.snapshots.pop_front();
        }
    }

    /// Oldest → newest iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<PreferenceWeight>> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Vec<PreferenceWeight>> {
        self.snapshots.back()
    }

    pub fn to_vec(&self) -> Vec<Vec<PreferenceWeight>> {
        self.snapshots.iter().cloned().collect()
    }
}

pub struct TemporalBlender {
    config: BlenderConfig,
}

impl TemporalBlender {
    pub fn new(config: BlenderConfig) -> Self {
        Self { config }
    }

    /// Blend the current result against retained history. With an empty
    /// history this is the identity (modulo the min-weight filter and
    /// re-sort). The caller appends the returned value as the newest
    /// snapshot.
    pub fn blend(
        &self,
        current: Vec<PreferenceWeight>,
        history: &SnapshotHistory,
    ) -> Vec<PreferenceWeight> {
        let mut merged: HashMap<String, PreferenceWeight> = current
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();

        let k = history.len();
        for (i, snapshot) in history.iter().enumerate() {
            let recency = self.config.recency_base.powi((k - 1 - i) as i32);

            for prior in snapshot {
                if let Some(entry) = merged.get_mut(&prior.name) {
                    entry.weight = entry.weight * self.config.current_share
                        + prior.weight * self.config.prior_share * recency;
                } else if prior.weight > self.config.carryover_threshold {
                    // Previously important interest absent from the current
                    // cycle: carry it over, decayed
                    merged.insert(
                        prior.name.clone(),
                        PreferenceWeight::new(
                            prior.name.clone(),
                            prior.weight * self.config.carryover_scale * recency,
                            prior.domain,
                        ),
                    );
                }
            }
        }

        let mut blended: Vec<PreferenceWeight> = merged
            .into_values()
            .filter(|entry| entry.weight > self.config.min_weight)
            .collect();
        sort_by_weight_desc(&mut blended);

        debug!(
            snapshots = k,
            blended = blended.len(),
            "Temporal blend complete"
        );

        blended
    }
}
