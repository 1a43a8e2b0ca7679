use anyhow::Result;
use axum::Router;
use clap::Parser;
use crawler::CatalogClient;
use search_core::index::IndexMaintainer;
use search_core::ingest::Pipeline;
use search_core::limiter::{ConcurrencyLimiter, RateLimiter};
use search_core::persist::SledStore;
use search_core::ports::Store;
use search_core::search::Searcher;
use search_core::store::MemoryStore;
use search_core::tokenizer::StemNormalizer;
use server::{build_app, AppState, Limits};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Host to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Store directory, or `memory` for a process-local store
    #[arg(long, env = "DB_PATH", default_value = "./data/comics")]
    db: String,
    /// Catalog base URL
    #[arg(long, env = "SOURCE_URL", default_value = "https://xkcd.com")]
    source_url: String,
    /// Catalog request timeout seconds
    #[arg(long, env = "SOURCE_TIMEOUT_SECS", default_value_t = 10)]
    source_timeout_secs: u64,
    /// Maximum comics fetched at once during an update
    #[arg(long, env = "CONCURRENCY", default_value_t = 8)]
    concurrency: usize,
    /// Seconds between index rebuilds, at least 1
    #[arg(long, env = "INDEX_TTL_SECS", default_value_t = 20)]
    index_ttl_secs: u64,
    /// Indexed searches admitted per second
    #[arg(long, env = "SEARCH_RATE", default_value_t = 100.0)]
    search_rate: f64,
    /// Exhaustive searches served at once, at least 1
    #[arg(long, env = "SEARCH_CONCURRENCY", default_value_t = 10)]
    search_concurrency: usize,
}

fn open_store(db: &str) -> Result<Arc<dyn Store>> {
    if db == "memory" {
        tracing::warn!("using in-memory store, comics are lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(SledStore::open(db)?))
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let cancel = CancellationToken::new();
    let store = open_store(&args.db)?;
    let normalizer = Arc::new(StemNormalizer);
    let source = Arc::new(CatalogClient::new(&args.source_url, Duration::from_secs(args.source_timeout_secs))?);

    let index = Arc::new(IndexMaintainer::new(store.clone()));
    let maintainer = index.clone().start(Duration::from_secs(args.index_ttl_secs), cancel.clone())?;

    let pipeline = Pipeline::new(source, normalizer.clone(), store.clone(), args.concurrency, cancel.clone())?;
    let state = AppState {
        pipeline: Arc::new(pipeline),
        searcher: Arc::new(Searcher::new(store, normalizer.clone(), index)),
        normalizer,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    let limits = Limits {
        concurrency: Arc::new(ConcurrencyLimiter::new(args.search_concurrency)?),
        rate: Arc::new(RateLimiter::new(args.search_rate)?),
    };
    let app: Router = build_app(state, limits);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(cancel.clone())).await?;

    cancel.cancel();
    maintainer.await?;
    Ok(())
}
