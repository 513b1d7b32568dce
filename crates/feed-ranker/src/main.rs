//! Feed Ranker replay tool
//!
//! Replays a recorded session (candidate pool plus interaction events)
//! through the ranker and prints the resulting snapshot and next batch.

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use feed_ranker::{
    ContentItem, InMemoryCatalog, InteractionEvent, RankerConfig, Session, SessionSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "feed-ranker")]
#[command(about = "Replay a feed session and print the next ranked batch", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Replay document (reads stdin when omitted)")]
    input: Option<PathBuf>,

    #[arg(short, long, help = "Batch size (overrides the document)")]
    limit: Option<usize>,

    #[arg(long, env = "FEED_RANKER_REPLAY_SEED", help = "Seed for noise selection")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReplayDocument {
    candidates: Vec<ContentItem>,
    #[serde(default)]
    events: Vec<ReplayEvent>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ReplayEvent {
    item_id: String,
    event: InteractionEvent,
}

#[derive(Serialize)]
struct ReplayReport {
    snapshot: SessionSnapshot,
    batch: Vec<String>,
    total: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = RankerConfig::load().context("Failed to load configuration")?;
    let document = read_document(cli.input.as_ref()).await?;
    let limit = cli
        .limit
        .or(document.limit)
        .unwrap_or(config.ranking.default_limit);

    let catalog = match cli.seed {
        Some(seed) => {
            InMemoryCatalog::with_seed(document.candidates, config.ranking.clone(), seed)
        }
        None => InMemoryCatalog::new(document.candidates, config.ranking.clone()),
    };

    let session = Session::new(config);
    info!(
        session = %session.id(),
        candidates = catalog.len(),
        events = document.events.len(),
        "Replaying session"
    );

    session.observe_batch(catalog.items()).await;
    let by_id: HashMap<&str, &ContentItem> = catalog
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();

    for replay in &document.events {
        match by_id.get(replay.item_id.as_str()) {
            Some(item) => {
                session.record(item, replay.event).await;
            }
            None => warn!(item_id = %replay.item_id, "Event for unknown item skipped"),
        }
    }

    let response = session
        .next_batch(&catalog, limit)
        .await
        .context("Failed to load next batch")?;

    let report = ReplayReport {
        snapshot: session.snapshot().await,
        batch: response.posts.into_iter().map(|item| item.id).collect(),
        total: response.total,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn read_document(path: Option<&PathBuf>) -> Result<ReplayDocument> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("Invalid replay document")
}
