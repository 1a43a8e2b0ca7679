pub mod error;
pub mod index;
pub mod ingest;
pub mod limiter;
pub mod persist;
pub mod ports;
pub mod search;
pub mod store;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use error::{Error, Result};

/// Document identity as assigned by the catalog. Ids start at 1.
pub type DocId = u32;

/// A stored document. `words` is always the normalized token sequence joined
/// by single spaces, never raw prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub url: String,
    pub title: String,
    pub words: String,
}

impl Document {
    pub fn new(id: DocId, url: impl Into<String>, title: impl Into<String>, words: &[String]) -> Self {
        Self { id, url: url.into(), title: title.into(), words: words.join(" ") }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.words.split(' ').filter(|w| !w.is_empty())
    }
}

/// Document as served by the external catalog, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: DocId,
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Aggregates derived from the store on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub comics_fetched: usize,
    pub words_total: usize,
    pub words_unique: usize,
}

impl StoreStats {
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut stats = StoreStats::default();
        let mut unique: HashSet<&str> = HashSet::new();
        for doc in docs {
            stats.comics_fetched += 1;
            for word in doc.tokens() {
                stats.words_total += 1;
                unique.insert(word);
            }
        }
        stats.words_unique = unique.len();
        stats
    }
}

/// Store aggregates plus the catalog frontier at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub comics_total: DocId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_occurrences_and_distinct_words() {
        let docs = vec![
            Document::new(1, "u1", "t1", &["run".into(), "jump".into(), "run".into()]),
            Document::new(2, "u2", "t2", &["jump".into()]),
        ];
        let stats = StoreStats::from_documents(&docs);
        assert_eq!(stats, StoreStats { comics_fetched: 2, words_total: 4, words_unique: 2 });
    }

    #[test]
    fn empty_words_have_no_tokens() {
        let doc = Document::new(7, "", "", &[]);
        assert_eq!(doc.tokens().count(), 0);
    }
}
