use anyhow::Result;
use clap::{Parser, Subcommand};
use search_core::index::IndexMaintainer;
use search_core::persist::SledStore;
use search_core::ports::Store;
use search_core::tokenizer::tokenize;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Inspect and manage the comics store and its term index", long_about = None)]
struct Cli {
    /// Store directory
    #[arg(long, env = "DB_PATH", default_value = "./data/comics")]
    db: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the term index once and summarize it
    Build {
        /// Number of most frequent terms to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Print the postings of every normalized word of a phrase
    Lookup {
        phrase: String,
    },
    /// Print store aggregates
    Stats,
    /// Remove every comic from the store
    Drop,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let store = Arc::new(SledStore::open(&cli.db)?);

    match cli.command {
        Commands::Build { top } => {
            let maintainer = IndexMaintainer::new(store);
            let report = maintainer.rebuild().await?;
            let index = maintainer.snapshot();
            let top_terms: Vec<_> = index
                .top_terms(top)
                .into_iter()
                .map(|(term, postings)| json!({ "term": term, "postings": postings }))
                .collect();
            tracing::info!(indexed = report.indexed, skipped = report.skipped, "index build complete");
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "indexed": report.indexed,
                    "skipped": report.skipped,
                    "terms": report.terms,
                    "top_terms": top_terms,
                }))?
            );
        }
        Commands::Lookup { phrase } => {
            let maintainer = IndexMaintainer::new(store);
            maintainer.rebuild().await?;
            for term in tokenize(&phrase) {
                let postings = maintainer.lookup(&term);
                println!("{term}\t{}", serde_json::to_string(&postings)?);
            }
        }
        Commands::Stats => {
            let stats = store.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Drop => {
            store.truncate().await?;
            tracing::info!(db = %cli.db, "store dropped");
        }
    }
    Ok(())
}
