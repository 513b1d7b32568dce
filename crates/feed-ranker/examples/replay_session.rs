//! Walk a short session through cold start, rule scoring and classifier takeover
//!
//! Run with `RUST_LOG=feed_ranker=debug` to follow the workflow.

use feed_ranker::{ContentItem, InMemoryCatalog, InteractionEvent, RankerConfig, Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RankerConfig::default();
    let pool: Vec<ContentItem> = (0..40)
        .map(|i| match i % 4 {
            0 => ContentItem::new(format!("post-{i}"), &["sports"], &["goal"]),
            1 => ContentItem::new(format!("post-{i}"), &["music"], &["live"]),
            2 => ContentItem::new(format!("post-{i}"), &["politics"], &["vote"]),
            _ => ContentItem::new(format!("post-{i}"), &["travel"], &["beach"]),
        })
        .collect();
    let catalog = InMemoryCatalog::with_seed(pool, config.ranking.clone(), 42);
    let session = Session::new(config);

    let mut batch = session.next_batch(&catalog, 10).await?.posts;
    for round in 1..=3 {
        for item in &batch {
            let event = match item.topics[0].as_str() {
                "sports" => InteractionEvent::Like,
                "politics" => InteractionEvent::NotInterested,
                _ => InteractionEvent::TimeSpent { delta_ms: 3_000 },
            };
            session.record(item, event).await;
        }

        batch = session.next_batch(&catalog, 10).await?.posts;
        let snapshot = session.snapshot().await;
        println!(
            "round {round}: source={:?} topics={:?} batch={:?}",
            snapshot.source,
            snapshot.interests.topic_names(),
            batch.iter().map(|item| item.id.as_str()).collect::<Vec<_>>()
        );
    }

    Ok(())
}
