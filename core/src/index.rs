use crate::ports::Store;
use crate::{DocId, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Immutable term -> document id postings. A document id is listed once per
/// occurrence of the term in the document's words.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<DocId>>,
    num_docs: usize,
    built_at: Option<Instant>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    fn add(&mut self, id: DocId, words: &str) {
        for word in words.split(' ').filter(|w| !w.is_empty()) {
            self.postings.entry(word.to_string()).or_default().push(id);
        }
        self.num_docs += 1;
    }

    pub fn lookup(&self, term: &str) -> &[DocId] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn num_docs(&self) -> usize { self.num_docs }

    pub fn built_at(&self) -> Option<Instant> { self.built_at }

    /// Terms ordered by posting count, longest first; ties by term.
    pub fn top_terms(&self, n: usize) -> Vec<(&str, usize)> {
        let mut terms: Vec<(&str, usize)> = self.postings.iter().map(|(t, p)| (t.as_str(), p.len())).collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        terms.truncate(n);
        terms
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub terms: usize,
}

/// Owns the published [`InvertedIndex`] and rebuilds it from the store.
/// Readers clone an `Arc` snapshot; a rebuild builds a fresh index off to the
/// side and only takes the write lock to swap the pointer.
pub struct IndexMaintainer {
    store: Arc<dyn Store>,
    current: RwLock<Arc<InvertedIndex>>,
}

impl IndexMaintainer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, current: RwLock::new(Arc::new(InvertedIndex::new())) }
    }

    pub fn snapshot(&self) -> Arc<InvertedIndex> {
        self.current.read().clone()
    }

    /// Postings for `term` in the current snapshot; empty if absent.
    pub fn lookup(&self, term: &str) -> Vec<DocId> {
        self.snapshot().lookup(term).to_vec()
    }

    /// Rebuild from the store and publish. If the id listing fails the
    /// previous snapshot stays published; a document that cannot be read is
    /// left out of this build only.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let ids = self.store.ids().await?;
        let mut next = InvertedIndex::new();
        let mut report = RebuildReport::default();
        for id in ids {
            match self.store.get(id).await {
                Ok(doc) => {
                    next.add(id, &doc.words);
                    report.indexed += 1;
                }
                Err(err) => {
                    tracing::warn!(id, error = %err, "failed to read comic, skipped until next rebuild");
                    report.skipped += 1;
                }
            }
        }
        next.built_at = Some(Instant::now());
        report.terms = next.num_terms();

        *self.current.write() = Arc::new(next);
        tracing::debug!(indexed = report.indexed, skipped = report.skipped, terms = report.terms, "index rebuilt");
        Ok(report)
    }

    /// Rebuild now and then every `tick` until `cancel` fires. `tick` must be
    /// non-zero.
    pub fn start(self: Arc<Self>, tick: Duration, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        if tick.is_zero() {
            return Err(Error::BadArguments("index rebuild interval must be positive"));
        }
        Ok(tokio::spawn(async move {
            let mut ticker = time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("index maintainer stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.rebuild().await {
                            tracing::error!(error = %err, "index rebuild failed, keeping previous index");
                        }
                    }
                }
            }
        }))
    }
}
