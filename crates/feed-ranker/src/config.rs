//! Ranker configuration
//!
//! Every empirically chosen constant of the engine lives here so it can be
//! overridden without a rebuild. Loading layers built-in defaults, an
//! optional `config/feed-ranker.{toml,yaml,json}` file and `FEED_RANKER__*`
//! environment variables (double underscore separates sections, e.g.
//! `FEED_RANKER__RANKING__NOISE_FRACTION=0.2`).

use crate::error::RankerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Preference scoring and the rule-based scorer
    pub scoring: ScoringConfig,

    /// Natural-break selection
    pub selector: SelectorConfig,

    /// Engagement classifier
    pub classifier: ClassifierConfig,

    /// Request-side ranking and noise injection
    pub ranking: RankingConfig,

    /// Session lifecycle
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weight_liked: f32,
    pub weight_interested: f32,
    pub weight_not_interested: f32,
    pub weight_commented: f32,

    /// Interactions required before any scoring happens (default: 10)
    pub min_interactions: usize,

    /// Entries at or below this weight are not surfaced (default: 0.1)
    pub min_weight: f32,

    /// Rule-based scorer keeps at most this many topics/hashtags (default: 5)
    pub max_entries: usize,

    /// Share of the per-occurrence average in the final weight (default: 0.6)
    pub average_share: f32,

    /// Share of the session-normalized total in the final weight (default: 0.4)
    pub total_share: f32,

    /// Expected viewing time when an item does not report one
    pub default_duration_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_liked: 3.0,
            weight_interested: 2.0,
            weight_not_interested: -4.0,
            weight_commented: 1.5,
            min_interactions: 10,
            min_weight: 0.1,
            max_entries: 5,
            average_share: 0.6,
            total_share: 0.4,
            default_duration_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Number of leading gaps examined (default: 10)
    pub scan_window: usize,

    /// Absolute gap floor (default: 0.1)
    pub min_gap: f32,

    /// Absolute gap as a share of the top weight (default: 0.25)
    pub head_ratio: f32,

    /// Relative gap that qualifies a split (default: 0.4)
    pub relative_gap: f32,

    /// Relative gap that commits immediately (default: 0.6)
    pub greedy_gap: f32,

    /// Entries kept when no natural break exists (default: 5)
    pub fallback_len: usize,

    /// Lists this short are returned whole (default: 3)
    pub whole_list_len: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            scan_window: 10,
            min_gap: 0.1,
            head_ratio: 0.25,
            relative_gap: 0.4,
            greedy_gap: 0.6,
            fallback_len: 5,
            whole_list_len: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Width of the hidden layer (default: 16)
    pub hidden_units: usize,

    /// Passes over the training window (default: 60)
    pub epochs: usize,

    pub learning_rate: f32,

    /// Most recent records used for training (default: 100)
    pub history_window: usize,

    /// Preference at or below this is a negative label (default: -1.5)
    pub negative_threshold: f32,

    /// Preference at or above this is a positive label (default: 1.5)
    pub positive_threshold: f32,

    /// Seed for weight initialization; entropy when unset
    pub seed: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            hidden_units: 16,
            epochs: 60,
            learning_rate: 0.05,
            history_window: 100,
            negative_threshold: -1.5,
            positive_threshold: 1.5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Share of each batch drawn from non-matching candidates (default: 0.3)
    pub noise_fraction: f32,

    /// Relevant core size as a multiple of the limit (default: 2)
    pub relevance_multiplier: usize,

    /// Batch size when a request does not name one (default: 10)
    pub default_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            noise_fraction: 0.3,
            relevance_multiplier: 2,
            default_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period before the idle retrain fires (default: 10s)
    pub idle_retrain_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_retrain_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn idle_retrain(&self) -> Duration {
        Duration::from_millis(self.idle_retrain_ms)
    }
}

impl RankerConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, RankerError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/feed-ranker").required(false))
            .add_source(config::Environment::with_prefix("FEED_RANKER").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), RankerError> {
        if !(0.0..=1.0).contains(&self.ranking.noise_fraction) {
            return Err(RankerError::config(
                format!(
                    "noise_fraction must be within [0, 1], got {}",
                    self.ranking.noise_fraction
                ),
                "ranking.noise_fraction",
            ));
        }

        if self.ranking.relevance_multiplier == 0 {
            return Err(RankerError::config(
                "relevance_multiplier must be greater than 0",
                "ranking.relevance_multiplier",
            ));
        }

        if self.classifier.history_window == 0 {
            return Err(RankerError::config(
                "history_window must be greater than 0",
                "classifier.history_window",
            ));
        }

        if self.classifier.hidden_units == 0 {
            return Err(RankerError::config(
                "hidden_units must be greater than 0",
                "classifier.hidden_units",
            ));
        }

        if self.classifier.epochs == 0 {
            return Err(RankerError::config(
                "epochs must be greater than 0",
                "classifier.epochs",
            ));
        }

        if self.classifier.learning_rate <= 0.0 {
            return Err(RankerError::config(
                format!(
                    "learning_rate must be positive, got {}",
                    self.classifier.learning_rate
                ),
                "classifier.learning_rate",
            ));
        }

        if self.classifier.negative_threshold >= self.classifier.positive_threshold {
            return Err(RankerError::config(
                format!(
                    "negative_threshold ({}) must be below positive_threshold ({})",
                    self.classifier.negative_threshold, self.classifier.positive_threshold
                ),
                "classifier.negative_threshold",
            ));
        }

        if self.scoring.default_duration_ms == 0 {
            return Err(RankerError::config(
                "default_duration_ms must be greater than 0",
                "scoring.default_duration_ms",
            ));
        }

        Ok(())
    }
}
