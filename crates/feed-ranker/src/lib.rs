//! Feed Ranker
//!
//! Learns a user's topic and hashtag interests from in-session interactions
//! and uses them to rank and diversify the next batch of a content feed.
//!
//! Two scoring strategies share one output shape: a rule-based scorer that
//! works from the first few interactions, and a small neural classifier that
//! takes over once it has been trained on the current vocabulary. Either way
//! the result is an [`InterestSet`] the content source ranks candidates with.

pub mod analyzer;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod diversity;
pub mod error;
pub mod network;
pub mod request;
pub mod rules;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;
pub mod vocabulary;

// Re-export key types
pub use analyzer::{Analysis, InterestAnalyzer};
pub use catalog::{ContentSource, InMemoryCatalog};
pub use classifier::{AdaptiveClassifier, ClassifierPhase, ClassifierStatus, TrainingOutcome};
pub use config::{
    ClassifierConfig, RankerConfig, RankingConfig, ScoringConfig, SelectorConfig, SessionConfig,
};
pub use diversity::DiversityRanker;
pub use error::RankerError;
pub use request::{ContentQuery, ContentRequest, ContentResponse};
pub use rules::{preference_score, RuleBasedScorer};
pub use selector::NaturalBreakSelector;
pub use session::{IdleRetrainer, Session, SessionSnapshot};
pub use store::{InteractionEvent, InteractionPatch, InteractionRecord, InteractionStore};
pub use types::*;
pub use vocabulary::Vocabulary;

pub type Result<T> = std::result::Result<T, RankerError>;

#[cfg(test)]
mod tests;
