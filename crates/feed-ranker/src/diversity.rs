//! Ranking & Diversification
//!
//! Request-side selection of a batch from a candidate pool:
//!
//! 1. Weighted interests: score each candidate by the summed weights of its
//!    matched topics and hashtags, sort descending, keep the top
//!    `relevance_multiplier * limit` as the relevant core
//! 2. Name-only interests: keep candidates with an exact topic/hashtag match
//! 3. No interests: every candidate is relevant
//!
//! Then `floor(limit * noise_fraction)` candidates outside the relevant core
//! are mixed in to keep the feed from collapsing onto known interests, the
//! combined list is shuffled and truncated to `limit`.

use crate::config::RankingConfig;
use crate::request::ContentRequest;
use crate::types::{ContentItem, InterestSet};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct DiversityRanker {
    config: RankingConfig,
}

impl DiversityRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Relevance of one candidate to weighted interests
    pub fn relevance(item: &ContentItem, interests: &InterestSet) -> f32 {
        let topic_weights: HashMap<&str, f32> = interests
            .topics
            .iter()
            .map(|e| (e.name.as_str(), e.weight))
            .collect();
        let hashtag_weights: HashMap<&str, f32> = interests
            .hashtags
            .iter()
            .map(|e| (e.name.as_str(), e.weight))
            .collect();
        Self::score_with(item, &topic_weights, &hashtag_weights)
    }

    fn score_with(
        item: &ContentItem,
        topic_weights: &HashMap<&str, f32>,
        hashtag_weights: &HashMap<&str, f32>,
    ) -> f32 {
        let topics: f32 = item
            .topics
            .iter()
            .filter_map(|t| topic_weights.get(t.as_str()))
            .sum();
        let hashtags: f32 = item
            .hashtags
            .iter()
            .filter_map(|h| hashtag_weights.get(h.as_str()))
            .sum();
        topics + hashtags
    }

    /// Indices of the relevant core and of the remaining candidates
    fn partition(&self, candidates: &[ContentItem], request: &ContentRequest) -> (Vec<usize>, Vec<usize>) {
        if request.is_weighted() {
            let topic_weights: HashMap<&str, f32> = request
                .interests
                .topics
                .iter()
                .map(|e| (e.name.as_str(), e.weight))
                .collect();
            let hashtag_weights: HashMap<&str, f32> = request
                .interests
                .hashtags
                .iter()
                .map(|e| (e.name.as_str(), e.weight))
                .collect();

            let mut scored: Vec<(usize, f32)> = candidates
                .iter()
                .enumerate()
                .map(|(i, item)| (i, Self::score_with(item, &topic_weights, &hashtag_weights)))
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));

            let core = request
                .limit
                .saturating_mul(self.config.relevance_multiplier)
                .min(scored.len());
            let mut indices: Vec<usize> = scored.into_iter().map(|(i, _)| i).collect();
            let rest = indices.split_off(core);
            return (indices, rest);
        }

        if request.has_names() {
            let topics: HashSet<&str> = request.topic_names.iter().map(String::as_str).collect();
            let hashtags: HashSet<&str> =
                request.hashtag_names.iter().map(String::as_str).collect();

            return (0..candidates.len()).partition(|&i| {
                let item = &candidates[i];
                item.topics.iter().any(|t| topics.contains(t.as_str()))
                    || item.hashtags.iter().any(|h| hashtags.contains(h.as_str()))
            });
        }

        ((0..candidates.len()).collect(), Vec::new())
    }

    /// Select, diversify and shuffle a batch of at most `request.limit` items
    pub fn rank<R: Rng + ?Sized>(
        &self,
        candidates: &[ContentItem],
        request: &ContentRequest,
        rng: &mut R,
    ) -> Vec<ContentItem> {
        let (relevant, excluded) = self.partition(candidates, request);

        let noise_count = (request.limit as f32 * self.config.noise_fraction).floor() as usize;
        let noise: Vec<usize> = excluded
            .choose_multiple(rng, noise_count)
            .copied()
            .collect();

        debug!(
            candidates = candidates.len(),
            relevant = relevant.len(),
            noise = noise.len(),
            limit = request.limit,
            "Ranked content batch"
        );

        let mut batch: Vec<usize> = relevant.into_iter().chain(noise).collect();
        batch.shuffle(rng);
        batch.truncate(request.limit);
        batch.into_iter().map(|i| candidates[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeightedEntry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(size: usize) -> Vec<ContentItem> {
        (0..size)
            .map(|i| ContentItem::new(format!("p{i}"), &["filler"], &[]))
            .collect()
    }

    fn ranker() -> DiversityRanker {
        DiversityRanker::new(RankingConfig::default())
    }

    #[test]
    fn test_relevance_sums_matched_weights() {
        let interests = InterestSet {
            topics: vec![WeightedEntry::new("sports", 1.0), WeightedEntry::new("music", 0.5)],
            hashtags: vec![WeightedEntry::new("goal", 0.25)],
        };
        let item = ContentItem::new("p", &["sports", "music", "art"], &["goal", "live"]);

        assert!((DiversityRanker::relevance(&item, &interests) - 1.75).abs() < 1e-6);
        assert_eq!(
            DiversityRanker::relevance(&ContentItem::new("q", &["art"], &[]), &interests),
            0.0
        );
    }

    #[test]
    fn test_weighted_core_is_top_scored() {
        let mut candidates = pool(30);
        candidates[7].topics = vec!["sports".to_string()];
        candidates[21].hashtags = vec!["goal".to_string()];

        let mut interests = InterestSet::empty();
        interests.topics.push(WeightedEntry::new("sports", 2.0));
        interests.hashtags.push(WeightedEntry::new("goal", 1.0));
        let request = ContentRequest::new(5, interests);

        let (core, rest) = ranker().partition(&candidates, &request);
        assert_eq!(core.len(), 10);
        assert_eq!(rest.len(), 20);
        assert_eq!(&core[..2], &[7, 21]);
    }

    #[test]
    fn test_legacy_names_filter_exact_matches() {
        let mut candidates = pool(10);
        candidates[2].topics = vec!["news".to_string()];
        candidates[5].hashtags = vec!["live".to_string()];
        candidates[8].topics = vec!["newsletter".to_string()];

        let request = ContentRequest::with_names(10, &["news"], &["live"]);
        let (core, rest) = ranker().partition(&candidates, &request);
        assert_eq!(core, vec![2, 5]);
        assert_eq!(rest.len(), 8);

        // 2 matches + floor(10 * 0.3) noise
        let mut rng = StdRng::seed_from_u64(1);
        let batch = ranker().rank(&candidates, &request, &mut rng);
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().any(|item| item.id == "p2"));
        assert!(batch.iter().any(|item| item.id == "p5"));
    }

    #[test]
    fn test_small_pool_is_returned_whole() {
        let candidates = pool(4);
        let mut rng = StdRng::seed_from_u64(9);
        let batch = ranker().rank(&candidates, &ContentRequest::new(10, InterestSet::empty()), &mut rng);

        assert_eq!(batch.len(), 4);
        let mut ids: Vec<_> = batch.iter().map(|item| item.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3"]);
    }

    #[test]
    fn test_zero_limit_is_empty() {
        let mut rng = StdRng::seed_from_u64(9);
        let batch = ranker().rank(&pool(5), &ContentRequest::new(0, InterestSet::empty()), &mut rng);
        assert!(batch.is_empty());
    }
}
