#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use search_core::ports::Source;
use search_core::{DocId, RawDocument, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Catalog double: serves `1..=frontier`, can fail selected ids, delay
/// fetches, hold them behind a gate and record peak concurrency.
pub struct FakeSource {
    frontier: Mutex<Option<DocId>>,
    failing: HashSet<DocId>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub fetched: Mutex<Vec<DocId>>,
}

impl FakeSource {
    pub fn new(frontier: DocId) -> Self {
        Self {
            frontier: Mutex::new(Some(frontier)),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            gate: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        let source = Self::new(0);
        *source.frontier.lock() = None;
        source
    }

    pub fn failing(mut self, ids: &[DocId]) -> Self {
        self.failing = ids.iter().copied().collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetches block until the returned semaphore is given permits.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn set_frontier(&self, frontier: DocId) {
        *self.frontier.lock() = Some(frontier);
    }

    pub fn fetched(&self) -> Vec<DocId> {
        let mut ids = self.fetched.lock().clone();
        ids.sort_unstable();
        ids
    }
}

pub fn raw(id: DocId) -> RawDocument {
    RawDocument {
        id,
        url: format!("https://imgs.example.com/{id}.png"),
        title: format!("Comic {id}"),
        description: format!("running jumping number{id}"),
    }
}

#[async_trait]
impl Source for FakeSource {
    async fn fetch(&self, id: DocId) -> Result<RawDocument> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.fetched.lock().push(id);

        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|e| anyhow!(e))?.forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&id) {
            return Err(anyhow!("catalog returned 500 for {id}").into());
        }
        Ok(raw(id))
    }

    async fn frontier(&self) -> Result<DocId> {
        let frontier = *self.frontier.lock();
        frontier.ok_or_else(|| anyhow!("catalog unreachable").into())
    }
}

/// Map of id -> words used to seed stores directly.
pub fn words(entries: &[(DocId, &[&str])]) -> HashMap<DocId, Vec<String>> {
    entries
        .iter()
        .map(|(id, ws)| (*id, ws.iter().map(|w| w.to_string()).collect()))
        .collect()
}
