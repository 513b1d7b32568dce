//! Content request and response shapes
//!
//! Interests travel as query parameters. The preferred encoding is a JSON
//! list of `{name, weight}` objects; the legacy encoding is a comma-separated
//! list of names. Decoding never fails: a malformed weighted list falls back
//! to the legacy parse, and a parameter that is unusable either way is
//! dropped so the request becomes unfiltered.

use crate::error::RankerError;
use crate::types::{ContentItem, InterestSet, WeightedEntry};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Raw query parameters as received at the boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<String>,
}

/// Decoded request for the next content batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentRequest {
    pub limit: usize,
    /// Weighted interests produced by the analyzer
    pub interests: InterestSet,
    /// Legacy name-only topic filter
    pub topic_names: Vec<String>,
    /// Legacy name-only hashtag filter
    pub hashtag_names: Vec<String>,
}

/// One decoded interest parameter
#[derive(Debug, Clone, PartialEq)]
enum InterestParam {
    Weighted(Vec<WeightedEntry>),
    Names(Vec<String>),
    Unfiltered,
}

impl ContentRequest {
    pub fn new(limit: usize, interests: InterestSet) -> Self {
        Self {
            limit,
            interests,
            ..Self::default()
        }
    }

    /// Name-only request for clients that predate weighted interests
    pub fn with_names(limit: usize, topics: &[&str], hashtags: &[&str]) -> Self {
        Self {
            limit,
            interests: InterestSet::empty(),
            topic_names: topics.iter().map(|t| t.to_string()).collect(),
            hashtag_names: hashtags.iter().map(|h| h.to_string()).collect(),
        }
    }

    /// True when the request carries weighted interests
    pub fn is_weighted(&self) -> bool {
        !self.interests.is_empty()
    }

    /// True when the request carries only legacy names
    pub fn has_names(&self) -> bool {
        !self.topic_names.is_empty() || !self.hashtag_names.is_empty()
    }

    /// True when weighted interests and legacy names arrived together
    ///
    /// Ranking uses the weighted interests and ignores the names.
    pub fn is_mixed(&self) -> bool {
        self.is_weighted() && self.has_names()
    }

    /// Decode raw query parameters
    pub fn from_query(query: &ContentQuery, default_limit: usize) -> Self {
        let limit = match query.limit.as_deref().map(str::trim) {
            None | Some("") => default_limit,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                let err = RankerError::MalformedParameters {
                    param: "limit".to_string(),
                    message: format!("`{raw}` is not a non-negative integer"),
                };
                warn!(error = %err, default_limit, "Using default limit");
                default_limit
            }),
        };

        let mut request = Self {
            limit,
            ..Self::default()
        };

        match parse_interest_param("topics", query.topics.as_deref()) {
            InterestParam::Weighted(entries) => request.interests.topics = entries,
            InterestParam::Names(names) => request.topic_names = names,
            InterestParam::Unfiltered => {}
        }
        match parse_interest_param("hashtags", query.hashtags.as_deref()) {
            InterestParam::Weighted(entries) => request.interests.hashtags = entries,
            InterestParam::Names(names) => request.hashtag_names = names,
            InterestParam::Unfiltered => {}
        }

        if request.is_mixed() {
            let err = RankerError::MalformedParameters {
                param: "topics/hashtags".to_string(),
                message: "weighted and comma-separated encodings mixed".to_string(),
            };
            warn!(error = %err, "Ranking by weighted interests only, legacy names ignored");
        }

        request
    }

    /// Encode as query parameters, weighted lists as JSON
    pub fn to_query(&self) -> ContentQuery {
        ContentQuery {
            limit: Some(self.limit.to_string()),
            topics: encode_param(&self.interests.topics, &self.topic_names),
            hashtags: encode_param(&self.interests.hashtags, &self.hashtag_names),
        }
    }
}

fn encode_param(weighted: &[WeightedEntry], names: &[String]) -> Option<String> {
    if !weighted.is_empty() {
        serde_json::to_string(weighted).ok()
    } else if !names.is_empty() {
        Some(names.join(","))
    } else {
        None
    }
}

fn parse_interest_param(param: &str, raw: Option<&str>) -> InterestParam {
    let raw = match raw.map(str::trim) {
        None | Some("") => return InterestParam::Unfiltered,
        Some(raw) => raw,
    };

    match serde_json::from_str::<Vec<WeightedEntry>>(raw) {
        Ok(entries) if entries.is_empty() => return InterestParam::Unfiltered,
        Ok(entries) => return InterestParam::Weighted(entries),
        Err(e) if looks_like_json(raw) => {
            let err = RankerError::MalformedParameters {
                param: param.to_string(),
                message: e.to_string(),
            };
            warn!(error = %err, "Falling back to comma-separated parse");
        }
        Err(_) => {}
    }

    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() || names.iter().any(|name| looks_like_json(name)) {
        warn!(param, "Unusable interest parameter, serving unfiltered");
        return InterestParam::Unfiltered;
    }

    InterestParam::Names(names)
}

fn looks_like_json(raw: &str) -> bool {
    raw.contains(|c| matches!(c, '[' | ']' | '{' | '}' | '"'))
}

/// Batch returned by the content source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentResponse {
    pub posts: Vec<ContentItem>,
    pub limit: usize,
    /// Size of the candidate pool the batch was drawn from
    pub total: usize,
}
