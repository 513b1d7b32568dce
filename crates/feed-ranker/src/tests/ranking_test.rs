//! Ranking and diversification over realistic candidate pools

use crate::config::RankingConfig;
use crate::diversity::DiversityRanker;
use crate::request::ContentRequest;
use crate::types::{ContentItem, InterestSet, WeightedEntry};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn pool(size: usize, matched_every: usize) -> Vec<ContentItem> {
    (0..size)
        .map(|i| {
            if i % matched_every == 0 {
                ContentItem::new(format!("p{i}"), &["sports"], &["goal"])
            } else {
                ContentItem::new(format!("p{i}"), &["cooking"], &[])
            }
        })
        .collect()
}

fn sports_interest() -> InterestSet {
    InterestSet {
        topics: vec![WeightedEntry::new("sports", 1.2)],
        hashtags: vec![WeightedEntry::new("goal", 0.4)],
    }
}

#[test]
fn test_pool_of_twenty_returns_exactly_limit() {
    let candidates = pool(20, 4);
    let ranker = DiversityRanker::new(RankingConfig::default());

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let batch = ranker.rank(
            &candidates,
            &ContentRequest::new(10, sports_interest()),
            &mut rng,
        );

        assert_eq!(batch.len(), 10);
        let ids: HashSet<_> = batch.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids.len(), 10, "no duplicates");
    }
}

#[test]
fn test_matched_items_come_from_relevance_core() {
    // 60 candidates, every 3rd matched: 20 matched fill the 2*limit core
    let candidates = pool(60, 3);
    let ranker = DiversityRanker::new(RankingConfig::default());
    let interests = sports_interest();

    let mut ranked: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, item)| (i, DiversityRanker::relevance(item, &interests)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let core: HashSet<String> = ranked[..20]
        .iter()
        .map(|(i, _)| candidates[*i].id.clone())
        .collect();

    let mut rng = StdRng::seed_from_u64(8);
    let batch = ranker.rank(&candidates, &ContentRequest::new(10, interests.clone()), &mut rng);

    assert_eq!(batch.len(), 10);
    for item in &batch {
        if DiversityRanker::relevance(item, &interests) > 0.0 {
            assert!(core.contains(&item.id));
        }
    }
    // at most floor(10 * 0.3) noise items
    let noise = batch.iter().filter(|item| !core.contains(&item.id)).count();
    assert!(noise <= 3);
}

#[test]
fn test_no_interests_serves_unfiltered() {
    let candidates = pool(15, 5);
    let ranker = DiversityRanker::new(RankingConfig::default());
    let mut rng = StdRng::seed_from_u64(4);

    let batch = ranker.rank(
        &candidates,
        &ContentRequest::new(10, InterestSet::empty()),
        &mut rng,
    );
    assert_eq!(batch.len(), 10);
}

#[test]
fn test_zero_noise_fraction_keeps_core_only() {
    let candidates = pool(60, 3);
    let ranker = DiversityRanker::new(RankingConfig {
        noise_fraction: 0.0,
        ..RankingConfig::default()
    });
    let mut rng = StdRng::seed_from_u64(2);

    let batch = ranker.rank(&candidates, &ContentRequest::new(10, sports_interest()), &mut rng);
    assert!(batch.iter().all(|item| item.topics == vec!["sports".to_string()]));
}
