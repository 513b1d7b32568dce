//! Interest Analyzer
//!
//! Single entry point of the batch-loading workflow. Chooses between the
//! trained classifier and the rule-based scorer:
//!
//! 1. Empty vocabulary or too few interactions: empty interest set
//! 2. Classifier trained on the current vocabulary: classifier weights,
//!    natural-break selection, `weight > min_weight` filter
//! 3. Classifier trained on an older vocabulary: forced retrain, then 2
//! 4. Otherwise: rule-based scorer

use crate::classifier::{AdaptiveClassifier, TrainedModel};
use crate::config::RankerConfig;
use crate::error::RankerError;
use crate::rules::RuleBasedScorer;
use crate::selector::NaturalBreakSelector;
use crate::store::InteractionRecord;
use crate::types::{InterestSet, InterestSource, WeightedEntry};
use crate::vocabulary::Vocabulary;
use std::sync::Arc;
use tracing::{debug, warn};

/// An interest set and the strategy that produced it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub interests: InterestSet,
    pub source: InterestSource,
}

pub struct InterestAnalyzer {
    min_interactions: usize,
    min_weight: f32,
    rules: RuleBasedScorer,
    selector: NaturalBreakSelector,
    classifier: AdaptiveClassifier,
}

impl InterestAnalyzer {
    pub fn new(config: &RankerConfig, classifier: AdaptiveClassifier) -> Self {
        Self {
            min_interactions: config.scoring.min_interactions,
            min_weight: config.scoring.min_weight,
            rules: RuleBasedScorer::new(config.scoring.clone()),
            selector: NaturalBreakSelector::new(config.selector.clone()),
            classifier,
        }
    }

    pub fn classifier(&self) -> &AdaptiveClassifier {
        &self.classifier
    }

    /// Produce the interest set for the next content request
    ///
    /// `interactions` must be ordered newest first; a forced retrain uses
    /// its leading records as the training window.
    pub async fn analyze(
        &self,
        interactions: &[InteractionRecord],
        vocabulary: &Vocabulary,
    ) -> Analysis {
        if vocabulary.is_empty() || interactions.len() < self.min_interactions {
            let reason = RankerError::InsufficientData {
                interactions: interactions.len(),
                required: self.min_interactions,
            };
            debug!(vocabulary = vocabulary.len(), "{reason}");
            return Analysis::default();
        }

        if let Some(model) = self.fresh_model(interactions, vocabulary).await {
            match self.classifier_interests(&model, interactions, vocabulary) {
                Ok(interests) => {
                    return Analysis {
                        interests,
                        source: InterestSource::Classifier,
                    }
                }
                Err(e) => warn!(error = %e, "Classifier inference failed, using rules"),
            }
        }

        Analysis {
            interests: self.rules.score(interactions, vocabulary),
            source: InterestSource::Rules,
        }
    }

    /// A model trained on exactly the current topic vocabulary, if any
    async fn fresh_model(
        &self,
        interactions: &[InteractionRecord],
        vocabulary: &Vocabulary,
    ) -> Option<Arc<TrainedModel>> {
        let model = self.classifier.current_model().await?;
        if model.matches(vocabulary.topics()) {
            return Some(model);
        }

        warn!(
            trained_on = model.vocabulary().len(),
            current = vocabulary.topics().len(),
            "Classifier is stale, retraining before inference"
        );
        self.classifier
            .train(interactions.to_vec(), vocabulary.topics().to_vec())
            .await;

        self.classifier
            .current_model()
            .await
            .filter(|model| model.matches(vocabulary.topics()))
    }

    fn classifier_interests(
        &self,
        model: &TrainedModel,
        interactions: &[InteractionRecord],
        vocabulary: &Vocabulary,
    ) -> Result<InterestSet, RankerError> {
        let topics = self.select(&model.topic_weights()?);
        let hashtags = self.select(&model.hashtag_weights(vocabulary.hashtags(), interactions)?);
        Ok(InterestSet { topics, hashtags })
    }

    fn select(&self, sorted: &[WeightedEntry]) -> Vec<WeightedEntry> {
        self.selector
            .select(sorted, self.min_weight)
            .into_iter()
            .filter(|e| e.weight > self.min_weight)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::store::{InteractionPatch, InteractionStore};
    use crate::types::ContentItem;

    fn analyzer() -> InterestAnalyzer {
        let mut config = RankerConfig::default();
        config.classifier = ClassifierConfig {
            seed: Some(5),
            epochs: 200,
            learning_rate: 0.3,
            ..ClassifierConfig::default()
        };
        let classifier = AdaptiveClassifier::new(config.classifier.clone(), config.scoring.clone());
        InterestAnalyzer::new(&config, classifier)
    }

    fn liked_and_disliked(repeat: usize) -> (InteractionStore, Vocabulary) {
        let mut store = InteractionStore::new(10_000);
        let mut vocabulary = Vocabulary::new();
        for i in 0..repeat {
            let sports = ContentItem::new(format!("s{i}"), &["sports"], &["goal"]);
            let politics = ContentItem::new(format!("p{i}"), &["politics"], &["vote"]);
            vocabulary.observe([&sports, &politics]);
            store.upsert(&sports, InteractionPatch::liked(true));
            store.upsert(&politics, InteractionPatch::not_interested(true));
        }
        (store, vocabulary)
    }

    #[tokio::test]
    async fn test_insufficient_data_is_empty() {
        let (store, vocabulary) = liked_and_disliked(4);
        let analysis = analyzer().analyze(&store.recent(usize::MAX), &vocabulary).await;

        assert!(analysis.interests.is_empty());
        assert_eq!(analysis.source, InterestSource::None);
    }

    #[tokio::test]
    async fn test_untrained_classifier_uses_rules() {
        let (store, vocabulary) = liked_and_disliked(10);
        let analysis = analyzer().analyze(&store.recent(usize::MAX), &vocabulary).await;

        assert_eq!(analysis.source, InterestSource::Rules);
        assert_eq!(analysis.interests.topic_names(), vec!["sports"]);
        assert_eq!(analysis.interests.hashtag_names(), vec!["goal"]);
    }

    #[tokio::test]
    async fn test_trained_classifier_drives_interests() {
        let (store, vocabulary) = liked_and_disliked(10);
        let analyzer = analyzer();
        let history = store.recent(usize::MAX);
        analyzer
            .classifier()
            .train(history.clone(), vocabulary.topics().to_vec())
            .await;

        let analysis = analyzer.analyze(&history, &vocabulary).await;
        assert_eq!(analysis.source, InterestSource::Classifier);
        assert_eq!(analysis.interests.topic_names(), vec!["sports"]);
        assert!(analysis.interests.topics.iter().all(|e| e.weight > 0.1));
    }

    #[tokio::test]
    async fn test_vocabulary_growth_forces_retrain() {
        let (mut store, mut vocabulary) = liked_and_disliked(10);
        let analyzer = analyzer();
        analyzer
            .classifier()
            .train(store.recent(usize::MAX), vocabulary.topics().to_vec())
            .await;

        let art = ContentItem::new("a1", &["art"], &[]);
        vocabulary.observe([&art]);
        store.upsert(&art, InteractionPatch::liked(true));

        let analysis = analyzer.analyze(&store.recent(usize::MAX), &vocabulary).await;
        assert_eq!(analysis.source, InterestSource::Classifier);

        let status = analyzer.classifier().status().await;
        assert_eq!(status.training_runs, 2);
        assert_eq!(status.vocabulary_snapshot, vocabulary.topics().to_vec());
    }
}
