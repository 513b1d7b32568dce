//! Rule-Based Scorer
//!
//! Turns interaction records into topic/hashtag weights without a trained
//! model. Always available, used on cold start and whenever the classifier is
//! not trained.
//!
//! Each record yields one scalar reaction:
//! - explicit flags: liked +3.0, interested +2.0, not interested -4.0,
//!   commented +1.5 (additive)
//! - no flag set: `(time_spent / duration - 0.5) * 2`
//!
//! Per topic the reactions of every record carrying it are folded into
//! `0.6 * average + 0.4 * total / interaction_count`.

use crate::config::ScoringConfig;
use crate::store::InteractionRecord;
use crate::types::{sort_descending, InterestSet, WeightedEntry};
use crate::vocabulary::Vocabulary;
use std::collections::HashMap;
use tracing::debug;

/// Compute the scalar reaction of one record
pub fn preference_score(record: &InteractionRecord, config: &ScoringConfig) -> f32 {
    if !record.has_explicit_signal() {
        return time_score(record);
    }

    let mut score = 0.0;
    if record.liked {
        score += config.weight_liked;
    }
    if record.interested {
        score += config.weight_interested;
    }
    if record.not_interested {
        score += config.weight_not_interested;
    }
    if record.commented {
        score += config.weight_commented;
    }
    score
}

/// Dwell time relative to the expected duration, centered on half-watched
fn time_score(record: &InteractionRecord) -> f32 {
    if record.duration_ms == 0 {
        return 0.0;
    }
    let ratio = record.time_spent_ms as f64 / record.duration_ms as f64;
    ((ratio - 0.5) * 2.0) as f32
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    positive: f32,
    negative: f32,
    count: usize,
}

impl Tally {
    fn add(&mut self, reaction: f32) {
        if reaction > 0.0 {
            self.positive += reaction;
        } else if reaction < 0.0 {
            self.negative += reaction.abs();
        }
        self.count += 1;
    }
}

pub struct RuleBasedScorer {
    config: ScoringConfig,
}

impl RuleBasedScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score every vocabulary topic and hashtag and keep the strongest few
    pub fn score(&self, interactions: &[InteractionRecord], vocabulary: &Vocabulary) -> InterestSet {
        if vocabulary.is_empty() || interactions.len() < self.config.min_interactions {
            debug!(
                interactions = interactions.len(),
                vocabulary = vocabulary.len(),
                "Not enough data for rule-based scoring"
            );
            return InterestSet::empty();
        }

        let weights = self.weigh(interactions, vocabulary);
        InterestSet {
            topics: self.top_entries(weights.topics),
            hashtags: self.top_entries(weights.hashtags),
        }
    }

    /// Unfiltered weights for every vocabulary name that occurs in the history
    ///
    /// Entries are sorted descending; zero weights are dropped.
    pub fn weigh(&self, interactions: &[InteractionRecord], vocabulary: &Vocabulary) -> InterestSet {
        let mut topic_tallies: HashMap<&str, Tally> = HashMap::new();
        let mut hashtag_tallies: HashMap<&str, Tally> = HashMap::new();

        for record in interactions {
            let reaction = preference_score(record, &self.config);

            for topic in &record.topics {
                if vocabulary.contains_topic(topic) {
                    topic_tallies.entry(topic.as_str()).or_default().add(reaction);
                }
            }
            for hashtag in &record.hashtags {
                if vocabulary.contains_hashtag(hashtag) {
                    hashtag_tallies
                        .entry(hashtag.as_str())
                        .or_default()
                        .add(reaction);
                }
            }
        }

        let total_interactions = interactions.len().max(1) as f32;
        InterestSet {
            topics: self.to_entries(vocabulary.topics(), &topic_tallies, total_interactions),
            hashtags: self.to_entries(vocabulary.hashtags(), &hashtag_tallies, total_interactions),
        }
    }

    fn to_entries(
        &self,
        names: &[String],
        tallies: &HashMap<&str, Tally>,
        total_interactions: f32,
    ) -> Vec<WeightedEntry> {
        let mut entries: Vec<WeightedEntry> = names
            .iter()
            .filter_map(|name| {
                let tally = tallies.get(name.as_str())?;
                let total = tally.positive - tally.negative;
                let average = if tally.count > 0 {
                    total / tally.count as f32
                } else {
                    0.0
                };
                let weight = self.config.average_share * average
                    + self.config.total_share * (total / total_interactions);
                (weight != 0.0).then(|| WeightedEntry::new(name.clone(), weight))
            })
            .collect();

        sort_descending(&mut entries);
        entries
    }

    fn top_entries(&self, entries: Vec<WeightedEntry>) -> Vec<WeightedEntry> {
        entries
            .into_iter()
            .filter(|e| e.weight > self.config.min_weight)
            .take(self.config.max_entries)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InteractionPatch, InteractionStore};
    use crate::types::ContentItem;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn record_with(patch: InteractionPatch) -> InteractionRecord {
        let mut store = InteractionStore::new(10_000);
        let item = ContentItem::new("p", &["sports"], &[]);
        store.upsert(&item, patch);
        store.get("p").cloned().unwrap()
    }

    #[test]
    fn test_explicit_signals_are_additive() {
        let mut store = InteractionStore::new(10_000);
        let item = ContentItem::new("p", &["sports"], &[]);
        store.upsert(&item, InteractionPatch::liked(true));
        store.upsert(&item, InteractionPatch::commented());
        store.upsert(&item, InteractionPatch::interested(true));

        let score = preference_score(store.get("p").unwrap(), &config());
        assert!((score - 6.5).abs() < 1e-6);
    }

    #[test]
    fn test_not_interested_is_strongly_negative() {
        let score = preference_score(&record_with(InteractionPatch::not_interested(true)), &config());
        assert_eq!(score, -4.0);
    }

    #[test]
    fn test_time_fallback_without_flags() {
        let mut store = InteractionStore::new(10_000);
        let item = ContentItem::new("p", &["sports"], &[]).with_duration(4_000);
        store.record_time_spent(&item, 4_000);
        let score = preference_score(store.get("p").unwrap(), &config());
        assert!((score - 1.0).abs() < 1e-6);

        let mut store = InteractionStore::new(10_000);
        store.record_time_spent(&item, 0);
        let score = preference_score(store.get("p").unwrap(), &config());
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_time_is_ignored_when_flags_exist() {
        let mut store = InteractionStore::new(10_000);
        let item = ContentItem::new("p", &["sports"], &[]).with_duration(1_000);
        store.record_time_spent(&item, 50_000);
        store.upsert(&item, InteractionPatch::liked(true));

        let score = preference_score(store.get("p").unwrap(), &config());
        assert_eq!(score, 3.0);
    }

    #[test]
    fn test_below_threshold_returns_empty() {
        let mut store = InteractionStore::new(10_000);
        let mut vocabulary = Vocabulary::new();
        for i in 0..9 {
            let item = ContentItem::new(format!("p{i}"), &["sports"], &[]);
            vocabulary.observe([&item]);
            store.upsert(&item, InteractionPatch::liked(true));
        }

        let scorer = RuleBasedScorer::new(config());
        assert!(scorer.score(&store.to_vec(), &vocabulary).is_empty());
    }

    #[test]
    fn test_empty_vocabulary_returns_empty() {
        let mut store = InteractionStore::new(10_000);
        for i in 0..12 {
            let item = ContentItem::new(format!("p{i}"), &["sports"], &[]);
            store.upsert(&item, InteractionPatch::liked(true));
        }

        let scorer = RuleBasedScorer::new(config());
        assert!(scorer.score(&store.to_vec(), &Vocabulary::new()).is_empty());
    }

    #[test]
    fn test_weight_blends_average_and_total() {
        // 10 likes on sports, 10 neutral-time views on news
        let mut store = InteractionStore::new(10_000);
        let mut vocabulary = Vocabulary::new();
        for i in 0..10 {
            let item = ContentItem::new(format!("s{i}"), &["sports"], &[]);
            vocabulary.observe([&item]);
            store.upsert(&item, InteractionPatch::liked(true));
        }
        for i in 0..10 {
            let item = ContentItem::new(format!("n{i}"), &["news"], &[]).with_duration(2_000);
            vocabulary.observe([&item]);
            store.record_time_spent(&item, 1_000);
        }

        let scorer = RuleBasedScorer::new(config());
        let weights = scorer.weigh(&store.to_vec(), &vocabulary);

        // avg 3.0, total 30 / 20 interactions
        assert_eq!(weights.topics.len(), 1);
        assert_eq!(weights.topics[0].name, "sports");
        assert!((weights.topics[0].weight - 2.4).abs() < 1e-5);
    }

    #[test]
    fn test_keeps_at_most_five_entries() {
        let mut store = InteractionStore::new(10_000);
        let mut vocabulary = Vocabulary::new();
        for i in 0..8 {
            for j in 0..2 {
                let topic = format!("t{i}");
                let item = ContentItem::new(format!("p{i}-{j}"), &[topic.as_str()], &[]);
                vocabulary.observe([&item]);
                store.upsert(&item, InteractionPatch::liked(true));
            }
        }

        let scorer = RuleBasedScorer::new(config());
        let interests = scorer.score(&store.to_vec(), &vocabulary);
        assert_eq!(interests.topics.len(), 5);
        assert!(interests.hashtags.is_empty());
    }
}
