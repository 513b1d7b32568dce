//! Interaction Store
//!
//! Holds one record per content item the user has acted on. Records are
//! created on first touch, mutated in place afterwards and never deleted
//! during a session.

use crate::types::ContentItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discrete and continuous signals from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionEvent {
    Like,
    Unlike,
    Interested,
    NotInterested,
    Comment,
    ViewStarted,
    ViewEnded,
    TimeSpent { delta_ms: u64 },
}

/// Accumulated interaction state for one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub item_id: String,
    /// Copied from the item at first interaction
    pub topics: Vec<String>,
    /// Copied from the item at first interaction
    pub hashtags: Vec<String>,
    pub liked: bool,
    pub interested: bool,
    pub not_interested: bool,
    /// Once set, stays set
    pub commented: bool,
    pub time_spent_ms: u64,
    /// Expected viewing time
    pub duration_ms: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(skip)]
    view_started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    sequence: u64,
}

impl InteractionRecord {
    fn new(item: &ContentItem, default_duration_ms: u64, now: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id.clone(),
            topics: item.topics.clone(),
            hashtags: item.hashtags.clone(),
            liked: false,
            interested: false,
            not_interested: false,
            commented: false,
            time_spent_ms: 0,
            duration_ms: item.duration_ms.filter(|d| *d > 0).unwrap_or(default_duration_ms),
            last_updated: now,
            view_started_at: None,
            sequence: 0,
        }
    }

    /// True when any explicit reaction was recorded
    pub fn has_explicit_signal(&self) -> bool {
        self.liked || self.interested || self.not_interested || self.commented
    }

    fn set_interested(&mut self, value: bool) {
        self.interested = value;
        if value {
            self.not_interested = false;
        }
    }

    fn set_not_interested(&mut self, value: bool) {
        self.not_interested = value;
        if value {
            self.interested = false;
        }
    }
}

/// Partial update merged into a record
///
/// `None` leaves a flag untouched. `commented` can only be raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionPatch {
    pub liked: Option<bool>,
    pub interested: Option<bool>,
    pub not_interested: Option<bool>,
    pub commented: bool,
}

impl InteractionPatch {
    pub fn liked(value: bool) -> Self {
        Self {
            liked: Some(value),
            ..Self::default()
        }
    }

    pub fn interested(value: bool) -> Self {
        Self {
            interested: Some(value),
            ..Self::default()
        }
    }

    pub fn not_interested(value: bool) -> Self {
        Self {
            not_interested: Some(value),
            ..Self::default()
        }
    }

    pub fn commented() -> Self {
        Self {
            commented: true,
            ..Self::default()
        }
    }
}

/// Per-session interaction records keyed by item id
#[derive(Debug, Clone)]
pub struct InteractionStore {
    records: HashMap<String, InteractionRecord>,
    default_duration_ms: u64,
    next_sequence: u64,
}

impl InteractionStore {
    pub fn new(default_duration_ms: u64) -> Self {
        Self {
            records: HashMap::new(),
            default_duration_ms,
            next_sequence: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&InteractionRecord> {
        self.records.get(item_id)
    }

    /// Merge `patch` into the record for `item`, creating it if absent
    ///
    /// Returns false (and records nothing) for items without an id.
    pub fn upsert(&mut self, item: &ContentItem, patch: InteractionPatch) -> bool {
        self.upsert_at(item, patch, Utc::now())
    }

    pub fn upsert_at(
        &mut self,
        item: &ContentItem,
        patch: InteractionPatch,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(record) = self.touch(item, now) else {
            return false;
        };

        if let Some(liked) = patch.liked {
            record.liked = liked;
        }
        if let Some(interested) = patch.interested {
            record.set_interested(interested);
        }
        if let Some(not_interested) = patch.not_interested {
            record.set_not_interested(not_interested);
        }
        if patch.commented {
            record.commented = true;
        }
        true
    }

    /// Add `delta_ms` to the cumulative dwell time for `item`
    pub fn record_time_spent(&mut self, item: &ContentItem, delta_ms: u64) -> bool {
        self.record_time_spent_at(item, delta_ms, Utc::now())
    }

    pub fn record_time_spent_at(
        &mut self,
        item: &ContentItem,
        delta_ms: u64,
        now: DateTime<Utc>,
    ) -> bool {
        match self.touch(item, now) {
            Some(record) => {
                record.time_spent_ms = record.time_spent_ms.saturating_add(delta_ms);
                true
            }
            None => false,
        }
    }

    /// Apply a presentation-layer event
    pub fn apply(&mut self, item: &ContentItem, event: InteractionEvent) -> bool {
        self.apply_at(item, event, Utc::now())
    }

    pub fn apply_at(
        &mut self,
        item: &ContentItem,
        event: InteractionEvent,
        now: DateTime<Utc>,
    ) -> bool {
        match event {
            InteractionEvent::Like => self.upsert_at(item, InteractionPatch::liked(true), now),
            InteractionEvent::Unlike => self.upsert_at(item, InteractionPatch::liked(false), now),
            InteractionEvent::Interested => {
                self.upsert_at(item, InteractionPatch::interested(true), now)
            }
            InteractionEvent::NotInterested => {
                self.upsert_at(item, InteractionPatch::not_interested(true), now)
            }
            InteractionEvent::Comment => self.upsert_at(item, InteractionPatch::commented(), now),
            InteractionEvent::TimeSpent { delta_ms } => {
                self.record_time_spent_at(item, delta_ms, now)
            }
            InteractionEvent::ViewStarted => match self.touch(item, now) {
                Some(record) => {
                    record.view_started_at = Some(now);
                    true
                }
                None => false,
            },
            InteractionEvent::ViewEnded => {
                let started = self
                    .records
                    .get(&item.id)
                    .and_then(|record| record.view_started_at);
                // an end without a start carries no duration
                let Some(started) = started else {
                    return false;
                };
                let elapsed = (now - started).num_milliseconds().max(0) as u64;
                match self.touch(item, now) {
                    Some(record) => {
                        record.view_started_at = None;
                        record.time_spent_ms = record.time_spent_ms.saturating_add(elapsed);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// All records, in no particular order
    pub fn all(&self) -> Vec<&InteractionRecord> {
        self.records.values().collect()
    }

    /// Owned copy of every record
    pub fn to_vec(&self) -> Vec<InteractionRecord> {
        self.records.values().cloned().collect()
    }

    /// The `n` most recently touched records, newest first
    pub fn recent(&self, n: usize) -> Vec<InteractionRecord> {
        let mut records: Vec<&InteractionRecord> = self.records.values().collect();
        records.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        records.into_iter().take(n).cloned().collect()
    }

    fn touch(&mut self, item: &ContentItem, now: DateTime<Utc>) -> Option<&mut InteractionRecord> {
        if !item.has_id() {
            return None;
        }

        self.next_sequence += 1;
        let sequence = self.next_sequence;
        let default_duration_ms = self.default_duration_ms;

        let record = self
            .records
            .entry(item.id.clone())
            .or_insert_with(|| InteractionRecord::new(item, default_duration_ms, now));
        record.last_updated = now;
        record.sequence = sequence;
        Some(record)
    }
}
