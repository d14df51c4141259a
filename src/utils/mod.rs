// Utility functions for personalization-service

use crate::models::PreferenceWeight;

/// Sort preference weights descending, highest weight first.
pub fn sort_by_weight_desc(weights: &mut [PreferenceWeight]) {
    weights.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
