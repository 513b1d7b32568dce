//! Content source boundary
//!
//! The session asks a [`ContentSource`] for the next batch. Production
//! deployments put a remote service behind the trait; [`InMemoryCatalog`]
//! ranks a fixed candidate pool locally.

use crate::config::RankingConfig;
use crate::diversity::DiversityRanker;
use crate::request::{ContentRequest, ContentResponse};
use crate::types::ContentItem;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch at most `request.limit` items matching the request's interests
    async fn fetch(&self, request: &ContentRequest) -> crate::Result<ContentResponse>;
}

/// Candidate pool ranked in process
pub struct InMemoryCatalog {
    items: Vec<ContentItem>,
    ranker: DiversityRanker,
    rng: Mutex<StdRng>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<ContentItem>, config: RankingConfig) -> Self {
        Self::with_rng(items, config, StdRng::from_entropy())
    }

    /// Deterministic noise selection and shuffling
    pub fn with_seed(items: Vec<ContentItem>, config: RankingConfig, seed: u64) -> Self {
        Self::with_rng(items, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(items: Vec<ContentItem>, config: RankingConfig, rng: StdRng) -> Self {
        Self {
            items,
            ranker: DiversityRanker::new(config),
            rng: Mutex::new(rng),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }
}

#[async_trait]
impl ContentSource for InMemoryCatalog {
    async fn fetch(&self, request: &ContentRequest) -> crate::Result<ContentResponse> {
        let posts = {
            let mut rng = self.rng.lock().await;
            self.ranker.rank(&self.items, request, &mut *rng)
        };

        debug!(
            returned = posts.len(),
            total = self.items.len(),
            weighted = request.is_weighted(),
            "Served content batch"
        );

        Ok(ContentResponse {
            posts,
            limit: request.limit,
            total: self.items.len(),
        })
    }
}
