//! Adaptive engagement classifier
//!
//! Predicts negative/neutral/positive engagement from a topic-membership
//! vector and is retrained from the most recent interactions.
//!
//! State machine: `Untrained -> Training -> Trained`, and `Trained ->
//! Training` on every retrain. Only one training run is ever in flight:
//! a retrain request that arrives while a run is active subscribes to the
//! completion channel and returns that run's outcome instead of starting a
//! second one. Training runs on a spawned task, so a caller that goes away
//! mid-run cannot leave the `training` flag stuck.
//!
//! A model is only valid against the exact topic vocabulary it was trained
//! on. Callers compare [`TrainedModel::vocabulary`] with the current topics
//! and force a retrain when they differ.

use crate::config::{ClassifierConfig, ScoringConfig};
use crate::error::RankerError;
use crate::network::EngagementNetwork;
use crate::rules::preference_score;
use crate::store::InteractionRecord;
use crate::types::{sort_descending, EngagementClass, WeightedEntry};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle phase of the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierPhase {
    Untrained,
    Training,
    Trained,
}

/// Result of a retrain request
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    /// A new model replaced the previous one
    Trained { run: u64, rows: usize, loss: f32 },
    /// Not enough interactions; nothing changed
    Skipped { interactions: usize },
    /// Training aborted; the classifier is untrained
    Failed { reason: String },
}

/// Read-only view of the classifier for observers
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierStatus {
    pub phase: ClassifierPhase,
    pub trained: bool,
    pub training: bool,
    pub vocabulary_snapshot: Vec<String>,
    /// Completed parameter update cycles
    pub training_runs: u64,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A fitted network bound to the topic vocabulary it was trained on
#[derive(Debug)]
pub struct TrainedModel {
    network: EngagementNetwork,
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
}

impl TrainedModel {
    fn new(network: EngagementNetwork, vocabulary: Vec<String>) -> Self {
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, topic)| (topic.clone(), i))
            .collect();
        Self {
            network,
            vocabulary,
            index,
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// True when `topics` is exactly the training vocabulary
    pub fn matches(&self, topics: &[String]) -> bool {
        self.vocabulary == topics
    }

    /// Membership vector over the training vocabulary
    fn features<'a>(&self, topics: impl IntoIterator<Item = &'a String>) -> Vec<f32> {
        let mut features = vec![0.0; self.vocabulary.len()];
        for topic in topics {
            if let Some(&i) = self.index.get(topic) {
                features[i] = 1.0;
            }
        }
        features
    }

    /// One entry per vocabulary topic, weighted `P(positive) - P(negative)`
    pub fn topic_weights(&self) -> Result<Vec<WeightedEntry>, RankerError> {
        let mut entries = Vec::with_capacity(self.vocabulary.len());
        for topic in &self.vocabulary {
            let probabilities = self.network.predict(&self.features([topic]))?;
            entries.push(WeightedEntry::new(topic.clone(), probabilities.contrast()));
        }
        sort_descending(&mut entries);
        Ok(entries)
    }

    /// One entry per hashtag, featurized by the topics it co-occurred with
    ///
    /// Hashtags that never appeared alongside a known topic are skipped.
    pub fn hashtag_weights(
        &self,
        hashtags: &[String],
        history: &[InteractionRecord],
    ) -> Result<Vec<WeightedEntry>, RankerError> {
        let mut entries = Vec::new();
        for hashtag in hashtags {
            let co_occurring = history
                .iter()
                .filter(|record| record.hashtags.iter().any(|h| h == hashtag))
                .flat_map(|record| record.topics.iter());
            let features = self.features(co_occurring);
            if features.iter().all(|v| *v == 0.0) {
                continue;
            }
            let probabilities = self.network.predict(&features)?;
            entries.push(WeightedEntry::new(hashtag.clone(), probabilities.contrast()));
        }
        sort_descending(&mut entries);
        Ok(entries)
    }
}

#[derive(Debug)]
struct ClassifierState {
    training: bool,
    model: Option<Arc<TrainedModel>>,
    training_runs: u64,
    last_trained_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl ClassifierState {
    fn phase(&self) -> ClassifierPhase {
        if self.training {
            ClassifierPhase::Training
        } else if self.model.is_some() {
            ClassifierPhase::Trained
        } else {
            ClassifierPhase::Untrained
        }
    }
}

struct Inner {
    classifier: ClassifierConfig,
    scoring: ScoringConfig,
    state: RwLock<ClassifierState>,
    completion_tx: broadcast::Sender<TrainingOutcome>,
}

#[derive(Clone)]
pub struct AdaptiveClassifier {
    inner: Arc<Inner>,
}

impl AdaptiveClassifier {
    pub fn new(classifier: ClassifierConfig, scoring: ScoringConfig) -> Self {
        let (completion_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                classifier,
                scoring,
                state: RwLock::new(ClassifierState {
                    training: false,
                    model: None,
                    training_runs: 0,
                    last_trained_at: None,
                    last_error: None,
                }),
                completion_tx,
            }),
        }
    }

    pub async fn status(&self) -> ClassifierStatus {
        let state = self.inner.state.read().await;
        ClassifierStatus {
            phase: state.phase(),
            trained: state.model.is_some(),
            training: state.training,
            vocabulary_snapshot: state
                .model
                .as_ref()
                .map(|model| model.vocabulary.clone())
                .unwrap_or_default(),
            training_runs: state.training_runs,
            last_trained_at: state.last_trained_at,
            last_error: state.last_error.clone(),
        }
    }

    pub async fn is_trained(&self) -> bool {
        self.inner.state.read().await.model.is_some()
    }

    /// Retrain from `history` (newest first) against the `topics` vocabulary
    ///
    /// Only the first `history_window` records are used. When a run is
    /// already in flight this joins it and returns its outcome.
    pub async fn train(
        &self,
        mut history: Vec<InteractionRecord>,
        topics: Vec<String>,
    ) -> TrainingOutcome {
        history.truncate(self.inner.classifier.history_window);

        let mut completion_rx = {
            let mut state = self.inner.state.write().await;
            let completion_rx = self.inner.completion_tx.subscribe();

            if state.training {
                debug!("Joining in-flight training run");
                drop(state);
                return Self::await_completion(completion_rx).await;
            }

            if history.len() < self.inner.scoring.min_interactions {
                debug!(
                    interactions = history.len(),
                    required = self.inner.scoring.min_interactions,
                    "Skipping training, not enough interactions"
                );
                return TrainingOutcome::Skipped {
                    interactions: history.len(),
                };
            }

            state.training = true;
            completion_rx
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let run = inner.state.read().await.training_runs + 1;
            let seed = inner.classifier.seed.map(|seed| seed.wrapping_add(run));
            let classifier = inner.classifier.clone();
            let scoring = inner.scoring.clone();

            let fitted = tokio::task::spawn_blocking(move || {
                fit(&history, topics, &classifier, &scoring, seed)
            })
            .await
            .unwrap_or_else(|e| Err(RankerError::DegenerateTrainingSet(e.to_string())));

            let mut state = inner.state.write().await;
            state.training = false;
            let outcome = match fitted {
                Ok((model, rows, loss)) => {
                    state.training_runs = run;
                    state.last_trained_at = Some(Utc::now());
                    state.last_error = None;
                    info!(
                        run,
                        rows,
                        loss,
                        vocabulary = model.vocabulary.len(),
                        "Engagement classifier trained"
                    );
                    state.model = Some(Arc::new(model));
                    TrainingOutcome::Trained { run, rows, loss }
                }
                Err(e) => {
                    warn!(error = %e, "Engagement classifier training failed");
                    state.model = None;
                    state.last_error = Some(e.to_string());
                    TrainingOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            // sent under the write lock: every subscriber that saw
            // `training == true` receives this run's outcome
            let _ = inner.completion_tx.send(outcome);
            drop(state);
        });

        match completion_rx.recv().await {
            Ok(outcome) => outcome,
            Err(e) => TrainingOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn await_completion(mut rx: broadcast::Receiver<TrainingOutcome>) -> TrainingOutcome {
        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(e) => TrainingOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// The current model, waiting out any in-flight training first
    ///
    /// Never observes weights of a run that has not finished.
    pub async fn current_model(&self) -> Option<Arc<TrainedModel>> {
        loop {
            let rx = {
                let state = self.inner.state.read().await;
                if !state.training {
                    return state.model.clone();
                }
                self.inner.completion_tx.subscribe()
            };
            debug!("Waiting for in-flight training before inference");
            Self::await_completion(rx).await;
        }
    }
}

/// Build the feature matrix and fit a fresh network
fn fit(
    history: &[InteractionRecord],
    topics: Vec<String>,
    classifier: &ClassifierConfig,
    scoring: &ScoringConfig,
    seed: Option<u64>,
) -> Result<(TrainedModel, usize, f32), RankerError> {
    if topics.is_empty() {
        return Err(RankerError::DegenerateTrainingSet(
            "empty topic vocabulary".to_string(),
        ));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let network = EngagementNetwork::new(topics.len(), classifier.hidden_units, &mut rng);
    let mut model = TrainedModel::new(network, topics);

    let mut features = Vec::new();
    let mut labels = Vec::new();
    for record in history {
        let row = model.features(&record.topics);
        if row.iter().all(|v| *v == 0.0) {
            continue;
        }
        features.extend(row);
        labels.push(EngagementClass::from_preference(
            preference_score(record, scoring),
            classifier.negative_threshold,
            classifier.positive_threshold,
        ));
    }

    if labels.is_empty() {
        return Err(RankerError::DegenerateTrainingSet(format!(
            "none of {} interactions carry a known topic",
            history.len()
        )));
    }

    let rows = labels.len();
    let inputs = Array2::from_shape_vec((rows, model.vocabulary.len()), features)?;
    let loss = model.network.fit(
        &inputs,
        &labels,
        classifier.epochs,
        classifier.learning_rate,
    )?;

    Ok((model, rows, loss))
}
