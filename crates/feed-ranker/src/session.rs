//! Per-user feed session
//!
//! Owns the interaction store, the vocabulary and the classifier, and runs
//! the batch-exhaustion workflow: retrain, analyze, request, observe.

use crate::analyzer::{Analysis, InterestAnalyzer};
use crate::catalog::ContentSource;
use crate::classifier::{AdaptiveClassifier, ClassifierStatus, TrainingOutcome};
use crate::config::RankerConfig;
use crate::error::RankerError;
use crate::request::{ContentRequest, ContentResponse};
use crate::store::{InteractionEvent, InteractionPatch, InteractionStore};
use crate::types::{ContentItem, InterestSet, InterestSource};
use crate::vocabulary::Vocabulary;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Serializable view of a session for observers
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub classifier: ClassifierStatus,
    pub interactions: usize,
    pub topics: usize,
    pub hashtags: usize,
    pub interests: InterestSet,
    pub source: InterestSource,
}

pub struct Session {
    id: Uuid,
    config: RankerConfig,
    store: RwLock<InteractionStore>,
    vocabulary: RwLock<Vocabulary>,
    analyzer: InterestAnalyzer,
    last: RwLock<Analysis>,
    activity: watch::Sender<u64>,
}

impl Session {
    pub fn new(config: RankerConfig) -> Self {
        let classifier =
            AdaptiveClassifier::new(config.classifier.clone(), config.scoring.clone());
        let analyzer = InterestAnalyzer::new(&config, classifier);
        let (activity, _) = watch::channel(0);

        Self {
            id: Uuid::new_v4(),
            store: RwLock::new(InteractionStore::new(config.scoring.default_duration_ms)),
            vocabulary: RwLock::new(Vocabulary::new()),
            analyzer,
            last: RwLock::new(Analysis::default()),
            activity,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &AdaptiveClassifier {
        self.analyzer.classifier()
    }

    /// Apply a presentation-layer event to the item's record
    ///
    /// The item's tags also join the vocabulary, since only displayed
    /// content can be interacted with.
    pub async fn record(&self, item: &ContentItem, event: InteractionEvent) -> bool {
        let applied = self.store.write().await.apply(item, event);
        if applied {
            self.vocabulary.write().await.observe([item]);
            self.activity.send_modify(|count| *count += 1);
            debug!(session = %self.id, item = %item.id, ?event, "Recorded interaction");
        }
        applied
    }

    /// Merge an explicit patch into the item's record
    pub async fn update(&self, item: &ContentItem, patch: InteractionPatch) -> bool {
        let applied = self.store.write().await.upsert(item, patch);
        if applied {
            self.vocabulary.write().await.observe([item]);
            self.activity.send_modify(|count| *count += 1);
        }
        applied
    }

    /// Grow the vocabulary from a displayed batch, returning the new tag count
    pub async fn observe_batch(&self, items: &[ContentItem]) -> usize {
        let added = self.vocabulary.write().await.observe(items);
        if added > 0 {
            debug!(session = %self.id, added, "Vocabulary grew");
        }
        added
    }

    /// Produce and remember the interest set for the next request
    pub async fn analyze(&self) -> Analysis {
        let interactions = self.store.read().await.recent(usize::MAX);
        let vocabulary = self.vocabulary.read().await.clone();

        let analysis = self.analyzer.analyze(&interactions, &vocabulary).await;
        *self.last.write().await = analysis.clone();
        analysis
    }

    /// Coalesced retrain on the most recent interactions
    pub async fn retrain(&self) -> TrainingOutcome {
        let history = self
            .store
            .read()
            .await
            .recent(self.config.classifier.history_window);
        let topics = self.vocabulary.read().await.topics().to_vec();
        self.classifier().train(history, topics).await
    }

    /// Load the next batch once the current one is exhausted
    #[instrument(skip(self, source), fields(session = %self.id))]
    pub async fn next_batch(
        &self,
        source: &dyn ContentSource,
        limit: usize,
    ) -> Result<ContentResponse, RankerError> {
        let outcome = self.retrain().await;
        debug!(?outcome, "Retrain before batch");

        let analysis = self.analyze().await;
        let request = ContentRequest::new(limit, analysis.interests);
        let response = source.fetch(&request).await.map_err(|e| {
            warn!(error = %e, limit, "Content source failed, batch not loaded");
            e
        })?;

        self.observe_batch(&response.posts).await;
        info!(
            returned = response.posts.len(),
            total = response.total,
            source = ?analysis.source,
            "Loaded next batch"
        );
        Ok(response)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let classifier = self.classifier().status().await;
        let interactions = self.store.read().await.len();
        let (topics, hashtags) = {
            let vocabulary = self.vocabulary.read().await;
            (vocabulary.topics().len(), vocabulary.hashtags().len())
        };
        let last = self.last.read().await.clone();

        SessionSnapshot {
            session_id: self.id,
            classifier,
            interactions,
            topics,
            hashtags,
            interests: last.interests,
            source: last.source,
        }
    }

    fn subscribe_activity(&self) -> watch::Receiver<u64> {
        self.activity.subscribe()
    }
}

/// Background task that retrains after a quiet period
///
/// Each interaction re-arms the timer; it fires once per quiet period.
/// Dropping the handle aborts the task. Training already handed to the
/// classifier still completes.
pub struct IdleRetrainer {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    fired: watch::Receiver<u64>,
}

impl IdleRetrainer {
    pub fn spawn(session: Arc<Session>) -> Self {
        let idle = session.config().session.idle_retrain();
        Self::spawn_with(session, idle)
    }

    pub fn spawn_with(session: Arc<Session>, idle: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (fired_tx, fired) = watch::channel(0);
        let activity = session.subscribe_activity();

        let handle = tokio::spawn(Self::run(session, idle, activity, shutdown_rx, fired_tx));

        Self {
            handle: Some(handle),
            shutdown_tx,
            fired,
        }
    }

    /// Retrains triggered so far
    pub fn fired(&self) -> u64 {
        *self.fired.borrow()
    }

    /// Stop the timer and wait for the task to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    async fn run(
        session: Arc<Session>,
        idle: Duration,
        mut activity: watch::Receiver<u64>,
        mut shutdown: watch::Receiver<bool>,
        fired: watch::Sender<u64>,
    ) {
        loop {
            // wait for the first interaction of a quiet period
            tokio::select! {
                changed = activity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = shutdown.changed() => return,
            }

            loop {
                tokio::select! {
                    changed = activity.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(idle) => break,
                    _ = shutdown.changed() => return,
                }
            }

            let outcome = session.retrain().await;
            fired.send_modify(|count| *count += 1);
            info!(session = %session.id(), ?outcome, "Idle retrain");
        }
    }
}

impl Drop for IdleRetrainer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::config::ClassifierConfig;
    use async_trait::async_trait;

    struct UnreachableSource;

    #[async_trait]
    impl ContentSource for UnreachableSource {
        async fn fetch(&self, _request: &ContentRequest) -> crate::Result<ContentResponse> {
            Err(RankerError::Source("connection refused".to_string()))
        }
    }

    fn config() -> RankerConfig {
        let mut config = RankerConfig::default();
        config.classifier = ClassifierConfig {
            seed: Some(21),
            epochs: 200,
            learning_rate: 0.3,
            ..ClassifierConfig::default()
        };
        config
    }

    #[tokio::test]
    async fn test_record_grows_store_and_vocabulary() {
        let session = Session::new(config());
        let item = ContentItem::new("p1", &["sports"], &["goal"]);

        assert!(session.record(&item, InteractionEvent::Like).await);
        assert!(!session.record(&ContentItem::new("", &["x"], &[]), InteractionEvent::Like).await);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.interactions, 1);
        assert_eq!(snapshot.topics, 1);
        assert_eq!(snapshot.hashtags, 1);
        assert_eq!(snapshot.source, InterestSource::None);
    }

    #[tokio::test]
    async fn test_next_batch_trains_and_observes() {
        let session = Session::new(config());
        for i in 0..10 {
            session
                .record(&ContentItem::new(format!("s{i}"), &["sports"], &[]), InteractionEvent::Like)
                .await;
            session
                .record(
                    &ContentItem::new(format!("p{i}"), &["politics"], &[]),
                    InteractionEvent::NotInterested,
                )
                .await;
        }

        let pool: Vec<ContentItem> = (0..12)
            .map(|i| ContentItem::new(format!("n{i}"), &["news"], &[]))
            .collect();
        let catalog = InMemoryCatalog::with_seed(pool, config().ranking, 3);

        let response = session.next_batch(&catalog, 5).await.unwrap();
        assert_eq!(response.posts.len(), 5);

        let snapshot = session.snapshot().await;
        assert!(snapshot.classifier.trained);
        assert_eq!(snapshot.classifier.training_runs, 1);
        assert_eq!(snapshot.source, InterestSource::Classifier);
        assert_eq!(snapshot.interests.topic_names(), vec!["sports"]);
        // the batch introduced "news"
        assert_eq!(snapshot.topics, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_is_rearmed_by_activity() {
        let session = Arc::new(Session::new(config()));
        let retrainer = IdleRetrainer::spawn_with(Arc::clone(&session), Duration::from_secs(10));
        let item = ContentItem::new("p1", &["sports"], &[]);

        session.record(&item, InteractionEvent::ViewStarted).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        session.record(&item, InteractionEvent::ViewEnded).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(retrainer.fired(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(retrainer.fired(), 1);

        // once per quiet period
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(retrainer.fired(), 1);

        retrainer.shutdown().await;
    }

    #[tokio::test]
    async fn test_source_failure_is_propagated() {
        let session = Session::new(config());
        session
            .record(&ContentItem::new("p1", &["sports"], &[]), InteractionEvent::Like)
            .await;

        let err = session.next_batch(&UnreachableSource, 10).await.unwrap_err();
        assert!(matches!(err, RankerError::Source(ref message) if message == "connection refused"));
        assert_eq!(session.snapshot().await.topics, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_merges_patch_and_arms_idle_timer() {
        let session = Arc::new(Session::new(config()));
        let retrainer = IdleRetrainer::spawn_with(Arc::clone(&session), Duration::from_secs(10));

        // items without an id record nothing and leave the timer idle
        assert!(
            !session
                .update(&ContentItem::new("", &["sports"], &[]), InteractionPatch::liked(true))
                .await
        );
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(retrainer.fired(), 0);

        let item = ContentItem::new("p1", &["sports"], &["goal"]);
        assert!(session.update(&item, InteractionPatch::interested(true)).await);
        assert!(session.update(&item, InteractionPatch::commented()).await);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.interactions, 1);
        assert_eq!(snapshot.hashtags, 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(retrainer.fired(), 1);

        retrainer.shutdown().await;
    }
}
