use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A corpus item as served by the content source. Read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Content duration, when the item reports one (used for dwell-time ratio)
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementKind {
    Like,
    Interested,
    NotInterested,
    Comment,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Interested => "interested",
            EngagementKind::NotInterested => "not_interested",
            EngagementKind::Comment => "comment",
        }
    }
}

/// Per-item aggregate of a viewer's explicit and implicit feedback.
///
/// Invariant: `interested` and `not_interested` are never both true;
/// setting one clears the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub item_id: String,
    pub topics: Vec<String>,
    pub hashtags: Vec<String>,
    pub liked: bool,
    pub interested: bool,
    pub not_interested: bool,
    pub commented: bool,
    pub time_spent_ms: f64,
    pub duration_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn from_item(item: &FeedItem) -> Self {
        Self {
            item_id: item.id.clone(),
            topics: item.topics.clone(),
            hashtags: item.hashtags.clone(),
            liked: false,
            interested: false,
            not_interested: false,
            commented: false,
            time_spent_ms: 0.0,
            duration_ms: item.duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// True when any explicit signal is set (dwell time is then ignored
    /// by the preference score).
    pub fn has_explicit_signal(&self) -> bool {
        self.liked || self.interested || self.not_interested || self.commented
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightDomain {
    Topic,
    Hashtag,
}

impl WeightDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightDomain::Topic => "topic",
            WeightDomain::Hashtag => "hashtag",
        }
    }
}

/// A named interest paired with a signed relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceWeight {
    pub name: String,
    pub weight: f64,
    pub domain: WeightDomain,
}

impl PreferenceWeight {
    pub fn new(name: impl Into<String>, weight: f64, domain: WeightDomain) -> Self {
        Self {
            name: name.into(),
            weight,
            domain,
        }
    }
}

/// One scoring cycle's output, per domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterestProfile {
    pub topics: Vec<PreferenceWeight>,
    pub hashtags: Vec<PreferenceWeight>,
}

impl InterestProfile {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.hashtags.is_empty()
    }
}

/// Wire entry of a weighted preference list (`{"name": ..., "weight": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedName {
    pub name: String,
    pub weight: f64,
}

/// Parsed shape of a preference parameter. Parsing is done once at the
/// boundary; downstream code switches on the variant instead of
/// re-inspecting raw strings.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferencePayload {
    Weighted(Vec<WeightedName>),
    NamesOnly(Vec<String>),
    Empty,
}

impl PreferencePayload {
    /// Parse a raw parameter: a JSON array of `{name, weight}` objects, or a
    /// comma-separated list of bare names (legacy fallback, implied weight 1).
    /// Malformed weighted JSON falls back to the legacy form; this never
    /// rejects a request.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return PreferencePayload::Empty;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return PreferencePayload::Empty;
        }

        if let Ok(entries) = serde_json::from_str::<Vec<WeightedName>>(trimmed) {
            if entries.is_empty() {
                return PreferencePayload::Empty;
            }
            return PreferencePayload::Weighted(entries);
        }

        let names: Vec<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            PreferencePayload::Empty
        } else {
            PreferencePayload::NamesOnly(names)
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self, PreferencePayload::Weighted(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PreferencePayload::Empty)
    }

    /// Name → weight lookup; legacy names carry an implied weight of 1.0.
    pub fn weight_map(&self) -> HashMap<String, f64> {
        match self {
            PreferencePayload::Weighted(entries) => entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.weight))
                .collect(),
            PreferencePayload::NamesOnly(names) => {
                names.iter().map(|name| (name.clone(), 1.0)).collect()
            }
            PreferencePayload::Empty => HashMap::new(),
        }
    }
}

/// A batch query as seen by the ranking gateway, after boundary parsing.
/// Authentication is the transport collaborator's concern; requests reaching
/// this type are assumed already verified.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub limit: usize,
    pub topics: PreferencePayload,
    pub hashtags: PreferencePayload,
}

impl BatchRequest {
    pub fn from_raw(
        limit: Option<usize>,
        topics: Option<&str>,
        hashtags: Option<&str>,
        default_limit: usize,
    ) -> Self {
        Self {
            limit: limit.filter(|l| *l > 0).unwrap_or(default_limit),
            topics: PreferencePayload::parse(topics),
            hashtags: PreferencePayload::parse(hashtags),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub items: Vec<FeedItem>,
    pub limit: usize,
    pub total: usize,
}

impl BatchResponse {
    pub fn empty(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weighted_payload() {
        let payload =
            PreferencePayload::parse(Some(r#"[{"name":"sports","weight":0.9},{"name":"news","weight":0.4}]"#));
        match payload {
            PreferencePayload::Weighted(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].name, "sports");
                assert!((entries[0].weight - 0.9).abs() < f64::EPSILON);
            }
            other => panic!("expected weighted payload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_legacy_names() {
        let payload = PreferencePayload::parse(Some("sports, news ,tech"));
        assert_eq!(
            payload,
            PreferencePayload::NamesOnly(vec![
                "sports".to_string(),
                "news".to_string(),
                "tech".to_string()
            ])
        );

        let map = payload.weight_map();
        assert_eq!(map.get("sports"), Some(&1.0));
    }

    #[test]
    fn test_malformed_json_falls_back_to_names() {
        // Unparsable weighted JSON must not reject the request
        let payload = PreferencePayload::parse(Some(r#"[{"name":"sports""#));
        assert!(matches!(payload, PreferencePayload::NamesOnly(_)));
    }

    #[test]
    fn test_parse_empty_payload() {
        assert!(PreferencePayload::parse(None).is_empty());
        assert!(PreferencePayload::parse(Some("  ")).is_empty());
        assert!(PreferencePayload::parse(Some("[]")).is_empty());
        assert!(PreferencePayload::parse(Some(" , ,")).is_empty());
    }

    #[test]
    fn test_batch_request_default_limit() {
        let request = BatchRequest::from_raw(None, None, None, 10);
        assert_eq!(request.limit, 10);
        assert!(request.topics.is_empty());

        let request = BatchRequest::from_raw(Some(0), None, None, 10);
        assert_eq!(request.limit, 10);

        let request = BatchRequest::from_raw(Some(25), None, None, 10);
        assert_eq!(request.limit, 25);
    }
}
