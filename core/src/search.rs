//! Ranked retrieval. Both strategies score a document by the number of
//! query-token hits, order by score descending then id ascending, and keep the
//! first `limit`.

use crate::index::IndexMaintainer;
use crate::ports::{Normalizer, Store};
use crate::{DocId, Document, Error, Result};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub id: DocId,
    pub score: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub comics: Vec<Document>,
    /// Number of comics returned, `min(limit, matched)`.
    pub total: usize,
    /// Number of comics that matched before truncation.
    pub matched: usize,
}

/// Sort by score descending with ascending id as tie-break, then truncate.
pub fn rank(hits: HashMap<DocId, usize>, limit: usize) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = hits
        .into_iter()
        .filter(|&(_, score)| score > 0)
        .map(|(id, score)| ScoredCandidate { id, score })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(limit);
    scored
}

pub struct Searcher {
    store: Arc<dyn Store>,
    normalizer: Arc<dyn Normalizer>,
    index: Arc<IndexMaintainer>,
}

impl Searcher {
    pub fn new(store: Arc<dyn Store>, normalizer: Arc<dyn Normalizer>, index: Arc<IndexMaintainer>) -> Self {
        Self { store, normalizer, index }
    }

    async fn query_tokens(&self, phrase: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Err(Error::BadArguments("limit must be positive"));
        }
        if phrase.trim().is_empty() {
            return Err(Error::BadArguments("phrase must not be empty"));
        }
        self.normalizer.normalize(phrase).await
    }

    /// Exhaustive scan: a query token hits a comic when it occurs anywhere in
    /// the comic's space-joined words, so a hit may straddle two words.
    pub async fn search(&self, phrase: &str, limit: usize) -> Result<SearchResult> {
        let tokens = self.query_tokens(phrase, limit).await?;
        let ids = self.store.ids().await.context("failed to get ids")?;

        let mut hits: HashMap<DocId, usize> = HashMap::new();
        for id in ids {
            let doc = self.store.get(id).await.with_context(|| format!("failed to get comic {id}"))?;
            let score = tokens.iter().filter(|t| doc.words.contains(t.as_str())).count();
            if score > 0 {
                hits.insert(id, score);
            }
        }
        self.collect(hits, limit).await
    }

    /// Indexed lookup: every posting of every query token adds one, so a term
    /// repeated inside a comic counts each time.
    pub async fn isearch(&self, phrase: &str, limit: usize) -> Result<SearchResult> {
        let tokens = self.query_tokens(phrase, limit).await?;
        let snapshot = self.index.snapshot();

        let mut hits: HashMap<DocId, usize> = HashMap::new();
        for token in &tokens {
            for &id in snapshot.lookup(token) {
                *hits.entry(id).or_insert(0) += 1;
            }
        }
        self.collect(hits, limit).await
    }

    async fn collect(&self, hits: HashMap<DocId, usize>, limit: usize) -> Result<SearchResult> {
        let matched = hits.len();
        let ranked = rank(hits, limit);
        tracing::debug!(matched, returned = ranked.len(), "comics ranked");

        let mut comics = Vec::with_capacity(ranked.len());
        for candidate in &ranked {
            match self.store.get(candidate.id).await {
                Ok(doc) => comics.push(doc),
                // The index may still list comics dropped since its last rebuild.
                Err(Error::NotFound(id)) => tracing::debug!(id, "indexed comic no longer stored, skipping"),
                Err(err) => {
                    let err = anyhow::Error::new(err).context(format!("failed to fetch comic {}", candidate.id));
                    return Err(err.into());
                }
            }
        }
        Ok(SearchResult { total: comics.len(), comics, matched })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_orders_by_score_then_id() {
        let hits: HashMap<DocId, usize> = [(5, 1), (2, 3), (9, 3), (1, 1), (7, 0)].into_iter().collect();
        let ranked = rank(hits, 10);
        let ids: Vec<DocId> = ranked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 9, 1, 5]);
    }

    #[test]
    fn rank_truncates_to_limit() {
        let hits: HashMap<DocId, usize> = (1..=20).map(|id| (id, 1)).collect();
        let ranked = rank(hits, 3);
        assert_eq!(ranked.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
