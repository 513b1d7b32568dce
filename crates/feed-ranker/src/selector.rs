//! Natural-Break Selector
//!
//! Splits a descending weight list into a head of strong interests and a
//! long weak tail with a single pass over the leading gaps.

use crate::config::SelectorConfig;
use crate::types::WeightedEntry;

pub struct NaturalBreakSelector {
    config: SelectorConfig,
}

impl NaturalBreakSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Index one past the last entry of the head
    ///
    /// `entries` must be sorted descending by weight.
    pub fn split_index(&self, entries: &[WeightedEntry], min_weight: f32) -> usize {
        if entries.len() <= self.config.whole_list_len {
            return entries.len();
        }

        let gap_threshold = self.config.min_gap.max(entries[0].weight * self.config.head_ratio);
        let scan = self.config.scan_window.min(entries.len() - 1);

        let mut best: Option<(usize, f32)> = None;
        for i in 0..scan {
            let current = entries[i].weight;
            let gap = current - entries[i + 1].weight;
            let relative = if current > 0.0 { gap / current } else { 0.0 };

            if gap <= gap_threshold && relative <= self.config.relative_gap {
                continue;
            }

            if relative > self.config.greedy_gap {
                best = Some((i + 1, gap));
                break;
            }

            if best.map_or(true, |(_, widest)| gap > widest) {
                best = Some((i + 1, gap));
            }
        }

        match best {
            Some((split, _)) => split,
            None => entries
                .iter()
                .take(self.config.fallback_len)
                .take_while(|e| e.weight > min_weight)
                .count(),
        }
    }

    /// The head of `entries`
    pub fn select(&self, entries: &[WeightedEntry], min_weight: f32) -> Vec<WeightedEntry> {
        let split = self.split_index(entries, min_weight);
        entries[..split].to_vec()
    }
}
