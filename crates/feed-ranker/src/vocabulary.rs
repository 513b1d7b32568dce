//! Session vocabulary of topics and hashtags
//!
//! Names are appended in first-seen order and never removed, so feature
//! indices of previously seen topics stay stable for the life of a session.

use crate::types::ContentItem;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Vocabulary {
    topics: Vec<String>,
    hashtags: Vec<String>,
    #[serde(skip)]
    seen_topics: HashSet<String>,
    #[serde(skip)]
    seen_hashtags: HashSet<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tags of every item in a received batch
    ///
    /// Returns the number of names that were new.
    pub fn observe<'a>(&mut self, items: impl IntoIterator<Item = &'a ContentItem>) -> usize {
        let mut added = 0;
        for item in items {
            for topic in &item.topics {
                if self.add_topic(topic) {
                    added += 1;
                }
            }
            for hashtag in &item.hashtags {
                if self.add_hashtag(hashtag) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn add_topic(&mut self, topic: &str) -> bool {
        Self::insert(&mut self.topics, &mut self.seen_topics, topic)
    }

    pub fn add_hashtag(&mut self, hashtag: &str) -> bool {
        Self::insert(&mut self.hashtags, &mut self.seen_hashtags, hashtag)
    }

    fn insert(names: &mut Vec<String>, seen: &mut HashSet<String>, name: &str) -> bool {
        if name.trim().is_empty() || seen.contains(name) {
            return false;
        }
        seen.insert(name.to_string());
        names.push(name.to_string());
        true
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.seen_topics.contains(topic)
    }

    pub fn contains_hashtag(&self, hashtag: &str) -> bool {
        self.seen_hashtags.contains(hashtag)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.hashtags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.topics.len() + self.hashtags.len()
    }
}
