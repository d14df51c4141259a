// ============================================
// Interaction Ledger
// ============================================
//
// Records and bounds engagement events per viewed item.
//
// - One record per distinct item id, created on first engagement and
//   mutated in place afterwards
// - `interested` and `not_interested` are mutually exclusive
// - At most `max_records` records are retained, evicted FIFO by
//   insertion order (not by timestamp)

use crate::config::LedgerConfig;
use crate::models::{EngagementKind, FeedItem, InteractionRecord};
use chrono::Utc;
use tracing::debug;

pub struct InteractionLedger {
    config: LedgerConfig,
    records: Vec<InteractionRecord>,
}

impl InteractionLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
        }
    }

    /// Record an explicit engagement with an item.
    ///
    /// Repeat `like` toggles the flag; `interested`/`not_interested` set the
    /// corresponding boolean and clear its counterpart; `comment` sets
    /// `commented`. Every mutation refreshes the record timestamp and
    /// enforces the retention cap.
    pub fn record_engagement(&mut self, item: &FeedItem, kind: EngagementKind) {
        let index = self.entry_index(item);
        let record = &mut self.records[index];

        match kind {
            EngagementKind::Like => record.liked = !record.liked,
            EngagementKind::Interested => {
                record.interested = true;
                record.not_interested = false;
            }
            EngagementKind::NotInterested => {
                record.not_interested = true;
                record.interested = false;
            }
            EngagementKind::Comment => record.commented = true,
        }
        record.timestamp = Utc::now();

        debug!(
            item_id = %item.id,
            kind = kind.as_str(),
            "Recorded engagement"
        );

        self.enforce_cap();
    }

    /// Accrue view time on an item. Elapsed values outside
    /// `(0, max_view_time_ms]` are measurement noise and are silently
    /// ignored rather than treated as errors.
    pub fn accrue_view_time(&mut self, item: &FeedItem, elapsed_ms: f64) {
        if !(elapsed_ms > 0.0 && elapsed_ms <= self.config.max_view_time_ms) {
            debug!(
                item_id = %item.id,
                elapsed_ms = elapsed_ms,
                "Ignoring out-of-range view time measurement"
            );
            return;
        }

        let index = self.entry_index(item);
        let record = &mut self.records[index];
        record.time_spent_ms += elapsed_ms;
        record.timestamp = Utc::now();

        self.enforce_cap();
    }

    /// The current ledger window, oldest first by insertion order.
    pub fn window(&self) -> &[InteractionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&InteractionRecord> {
        self.records.iter().find(|r| r.item_id == item_id)
    }

    /// Index of the record for this item, creating it on first engagement.
    fn entry_index(&mut self, item: &FeedItem) -> usize {
        if let Some(index) = self.records.iter().position(|r| r.item_id == item.id) {
            return index;
        }
        self.records.push(InteractionRecord::from_item(item));
        self.records.len() - 1
    }

    fn enforce_cap(&mut self) {
        if self.records.len() > self.config.max_records {
            let excess = self.records.len() - self.config.max_records;
            self.records.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            topics: vec!["sports".to_string()],
            hashtags: vec!["#game".to_string()],
            duration_ms: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_like_toggles() {
        let mut ledger = InteractionLedger::new(LedgerConfig::default());
        let item = item("a");

        ledger.record_engagement(&item, EngagementKind::Like);
        assert!(ledger.get("a").unwrap().liked);

        ledger.record_engagement(&item, EngagementKind::Like);
        assert!(!ledger.get("a").unwrap().liked);
    }

    #[test]
    fn test_interested_and_not_interested_are_exclusive() {
        let mut ledger = InteractionLedger::new(LedgerConfig::default());
        let item = item("a");

        ledger.record_engagement(&item, EngagementKind::Interested);
        let record = ledger.get("a").unwrap();
        assert!(record.interested);
        assert!(!record.not_interested);

        ledger.record_engagement(&item, EngagementKind::NotInterested);
        let record = ledger.get("a").unwrap();
        assert!(!record.interested);
        assert!(record.not_interested);

        ledger.record_engagement(&item, EngagementKind::Interested);
        let record = ledger.get("a").unwrap();
        assert!(record.interested);
        assert!(!record.not_interested);
    }

    #[test]
    fn test_single_record_per_item() {
        let mut ledger = InteractionLedger::new(LedgerConfig::default());
        let item = item("a");

        ledger.record_engagement(&item, EngagementKind::Like);
        ledger.record_engagement(&item, EngagementKind::Comment);
        ledger.accrue_view_time(&item, 1_500.0);

        assert_eq!(ledger.len(), 1);
        let record = ledger.get("a").unwrap();
        assert!(record.liked);
        assert!(record.commented);
        assert!((record.time_spent_ms - 1_500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_view_time_rejects_measurement_noise() {
        let mut ledger = InteractionLedger::new(LedgerConfig::default());
        let item = item("a");

        ledger.accrue_view_time(&item, 0.0);
        ledger.accrue_view_time(&item, -50.0);
        ledger.accrue_view_time(&item, 300_001.0);
        assert!(ledger.is_empty());

        ledger.accrue_view_time(&item, 300_000.0);
        assert_eq!(ledger.len(), 1);
        assert!((ledger.get("a").unwrap().time_spent_ms - 300_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cap_evicts_oldest_by_insertion() {
        let mut ledger = InteractionLedger::new(LedgerConfig {
            max_records: 100,
            ..Default::default()
        });

        for i in 0..150 {
            ledger.record_engagement(&item(&format!("item-{}", i)), EngagementKind::Like);
        }

        assert_eq!(ledger.len(), 100);
        assert!(ledger.get("item-0").is_none());
        assert!(ledger.get("item-49").is_none());
        assert!(ledger.get("item-50").is_some());
        assert!(ledger.get("item-149").is_some());
    }

    #[test]
    fn test_mutation_does_not_reorder() {
        let mut ledger = InteractionLedger::new(LedgerConfig {
            max_records: 2,
            ..Default::default()
        });

        ledger.record_engagement(&item("a"), EngagementKind::Like);
        ledger.record_engagement(&item("b"), EngagementKind::Like);
        // Touching "a" again must not move it to the back of the queue
        ledger.record_engagement(&item("a"), EngagementKind::Comment);
        ledger.record_engagement(&item("c"), EngagementKind::Like);

        assert!(ledger.get("a").is_none());
        assert!(ledger.get("b").is_some());
        assert!(ledger.get("c").is_some());
    }
}
