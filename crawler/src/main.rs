use anyhow::Result;
use clap::Parser;
use crawler::CatalogClient;
use search_core::ingest::{Pipeline, RunReport};
use search_core::persist::SledStore;
use search_core::tokenizer::StemNormalizer;
use search_core::Stats;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Download comics missing from the store, once")]
struct Cli {
    /// Store directory
    #[arg(long, env = "DB_PATH", default_value = "./data/comics")]
    db: String,
    /// Catalog base URL
    #[arg(long, env = "SOURCE_URL", default_value = "https://xkcd.com")]
    source_url: String,
    /// Maximum comics fetched at once
    #[arg(long, env = "CONCURRENCY", default_value_t = 8)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, env = "SOURCE_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,
}

#[derive(Serialize)]
struct Summary {
    report: RunReport,
    stats: Stats,
    finished_at: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let source = Arc::new(CatalogClient::new(&args.source_url, Duration::from_secs(args.timeout_secs))?);
    let store = Arc::new(SledStore::open(&args.db)?);
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(source, Arc::new(StemNormalizer), store.clone(), args.concurrency, cancel.clone())?;

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, draining in-flight comics");
                cancel.cancel();
            }
        }
    });

    let report = pipeline.run().await?;
    store.flush().await?;
    let stats = pipeline.stats().await?;
    let finished_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

    println!("{}", serde_json::to_string_pretty(&Summary { report, stats, finished_at })?);
    Ok(())
}
