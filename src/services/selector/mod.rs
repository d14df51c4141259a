// ============================================
// Rank Selector
// ============================================
//
// Reduces a descending-sorted weighted list to a sparse "top interests"
// set by looking for a natural gap: an unusually large drop between
// consecutive weights is treated as the boundary of the genuinely
// relevant entries.
//
// - Lists of 3 or fewer entries are kept whole
// - At most `max_gap_pairs` adjacent pairs are inspected (explicit scan
//   bound; long tails are never walked)
// - A gap qualifies when it exceeds max(gap_floor, top * top_fraction),
//   or when its size relative to the current weight exceeds
//   `relative_gap`; a relative gap above `strong_relative_gap` stops
//   the scan immediately
// - With no qualifying gap, fall back to min(fallback_take, entries
//   above min_weight), never less than one
// - The final list is always filtered to weight > min_weight

use crate::config::SelectorConfig;
use crate::models::PreferenceWeight;
use crate::utils::sort_by_weight_desc;
use tracing::debug;

pub struct RankSelector {
    config: SelectorConfig,
}

impl RankSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Cut a weighted list at its natural gap and drop sub-threshold
    /// entries. Input order does not matter; the list is re-sorted.
    pub fn select(&self, mut list: Vec<PreferenceWeight>) -> Vec<PreferenceWeight> {
        if list.is_empty() {
            return list;
        }

        sort_by_weight_desc(&mut list);
        let cut = self.cutoff_index(&list);
        debug!(input = list.len(), cut = cut, "Rank selection");

        list.truncate(cut);
        list.retain(|entry| entry.weight > self.config.min_weight);
        list
    }

    /// Split index for a descending-sorted list; always in `[1, len]`
    /// for non-empty input, and `len` when the list has 3 or fewer
    /// entries.
    pub fn cutoff_index(&self, list: &[PreferenceWeight]) -> usize {
        if list.len() <= 3 {
            return list.len();
        }

        let pairs = (list.len() - 1).min(self.config.max_gap_pairs);
        let gap_threshold = self
            .config
            .gap_floor
            .max(list[0].weight * self.config.top_fraction);

        let mut best_gap = 0.0;
        let mut split: Option<usize> = None;

        for i in 0..pairs {
            let current = list[i].weight;
            let gap = current - list[i + 1].weight;
            let relative = if current > 0.0 { gap / current } else { 0.0 };

            if (gap > gap_threshold || relative > self.config.relative_gap) && gap > best_gap {
                best_gap = gap;
                split = Some(i + 1);
            }

            if relative > self.config.strong_relative_gap {
                // Strong signal, stop scanning
                split = Some(i + 1);
                break;
            }
        }

        split.unwrap_or_else(|| {
            let above = list
                .iter()
                .filter(|entry| entry.weight > self.config.min_weight)
                .count();
            self.config.fallback_take.min(above).max(1)
        })
    }
}
