//! Core data types shared across the ranker

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A content item as delivered by the content source
///
/// Display fields are opaque to the ranker and carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Expected viewing time, when the source knows it
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, topics: &[&str], hashtags: &[&str]) -> Self {
        Self {
            id: id.into(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            hashtags: hashtags.iter().map(|h| h.to_string()).collect(),
            duration_ms: None,
            display: Map::new(),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Items without an id cannot be tracked
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// A topic or hashtag with a signed preference weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEntry {
    pub name: String,
    pub weight: f32,
}

impl WeightedEntry {
    pub fn new(name: impl Into<String>, weight: f32) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Sort entries by weight, heaviest first
///
/// The sort is stable so equal weights keep their vocabulary order.
pub fn sort_descending(entries: &mut [WeightedEntry]) {
    entries.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}

/// Topics and hashtags currently believed to drive engagement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestSet {
    pub topics: Vec<WeightedEntry>,
    pub hashtags: Vec<WeightedEntry>,
}

impl InterestSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.hashtags.is_empty()
    }

    pub fn topic_names(&self) -> Vec<&str> {
        self.topics.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn hashtag_names(&self) -> Vec<&str> {
        self.hashtags.iter().map(|e| e.name.as_str()).collect()
    }
}

/// Engagement label predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementClass {
    Negative,
    Neutral,
    Positive,
}

impl EngagementClass {
    pub const COUNT: usize = 3;

    /// Output column of this class
    pub fn index(self) -> usize {
        match self {
            EngagementClass::Negative => 0,
            EngagementClass::Neutral => 1,
            EngagementClass::Positive => 2,
        }
    }

    /// Label a preference score
    pub fn from_preference(score: f32, negative_threshold: f32, positive_threshold: f32) -> Self {
        if score <= negative_threshold {
            EngagementClass::Negative
        } else if score >= positive_threshold {
            EngagementClass::Positive
        } else {
            EngagementClass::Neutral
        }
    }
}

/// Which strategy produced an interest set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestSource {
    #[default]
    None,
    Rules,
    Classifier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_keeps_display_fields() {
        let item: ContentItem = serde_json::from_str(
            r#"{"id": "p1", "topics": ["sports"], "hashtags": [], "title": "Match day", "duration": 8000}"#,
        )
        .unwrap();

        assert_eq!(item.id, "p1");
        assert_eq!(item.duration_ms, Some(8000));
        assert_eq!(item.display["title"], "Match day");
    }

    #[test]
    fn test_missing_id_is_untracked() {
        let item: ContentItem = serde_json::from_str(r#"{"topics": ["news"]}"#).unwrap();
        assert!(!item.has_id());
        assert!(!ContentItem::new("  ", &[], &[]).has_id());
    }

    #[test]
    fn test_engagement_labels() {
        assert_eq!(
            EngagementClass::from_preference(-4.0, -1.5, 1.5),
            EngagementClass::Negative
        );
        assert_eq!(
            EngagementClass::from_preference(-1.5, -1.5, 1.5),
            EngagementClass::Negative
        );
        assert_eq!(
            EngagementClass::from_preference(0.4, -1.5, 1.5),
            EngagementClass::Neutral
        );
        assert_eq!(
            EngagementClass::from_preference(1.5, -1.5, 1.5),
            EngagementClass::Positive
        );
    }

    #[test]
    fn test_sort_descending_is_stable() {
        let mut entries = vec![
            WeightedEntry::new("a", 0.2),
            WeightedEntry::new("b", 0.9),
            WeightedEntry::new("c", 0.2),
        ];
        sort_descending(&mut entries);

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
