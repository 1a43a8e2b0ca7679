//! Ingestion pipeline: pulls documents missing from the store out of the
//! catalog, normalizes them and upserts them, with at most `concurrency`
//! fetches in flight and at most one run at a time.

use crate::ports::{Normalizer, Source, Store};
use crate::{DocId, Document, Error, RawDocument, Result, RunStatus, Stats};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Catalog id that never resolves upstream. Stored as a placeholder so that
/// runs stay idempotent.
pub const MISSING_COMIC_ID: DocId = 404;

/// Outcome of one [`Pipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub frontier: DocId,
    pub already_present: usize,
    pub launched: usize,
    pub ingested: usize,
    pub failed: usize,
    /// Launching stopped early because shutdown was requested.
    pub cancelled: bool,
}

impl RunReport {
    fn record(&mut self, joined: Result<(DocId, Result<()>), JoinError>) {
        match joined {
            Ok((_, Ok(()))) => self.ingested += 1,
            Ok((id, Err(err))) => {
                tracing::warn!(id, error = %err, "failed to ingest comic, skipping");
                self.failed += 1;
            }
            Err(err) => {
                tracing::error!(error = %err, "ingestion task panicked");
                self.failed += 1;
            }
        }
    }
}

/// Fetch, normalize and store a single document.
#[derive(Clone)]
struct Worker {
    source: Arc<dyn Source>,
    normalizer: Arc<dyn Normalizer>,
    store: Arc<dyn Store>,
}

impl Worker {
    async fn ingest(&self, id: DocId) -> Result<()> {
        let raw = if id == MISSING_COMIC_ID {
            tracing::debug!(id, "skipping fetch of missing comic");
            RawDocument { id, url: String::new(), title: "404".into(), description: "Not found".into() }
        } else {
            self.source.fetch(id).await?
        };
        let words = self.normalizer.normalize(&format!("{} {}", raw.title, raw.description)).await?;
        self.store.upsert(&Document::new(id, raw.url, raw.title, &words)).await?;
        tracing::debug!(id, words = words.len(), "comic ingested");
        Ok(())
    }
}

/// Holds the single-flight slot; marks the pipeline idle before the slot is released.
struct RunGuard<'a> {
    _slot: MutexGuard<'a, ()>,
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct Pipeline {
    worker: Worker,
    concurrency: usize,
    slot: Mutex<()>,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn Source>,
        normalizer: Arc<dyn Normalizer>,
        store: Arc<dyn Store>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if concurrency < 1 {
            return Err(Error::BadArguments("ingestion concurrency must be at least 1"));
        }
        Ok(Self {
            worker: Worker { source, normalizer, store },
            concurrency,
            slot: Mutex::new(()),
            running: AtomicBool::new(false),
            cancel,
        })
    }

    fn try_begin(&self) -> Result<RunGuard<'_>> {
        let slot = self.slot.try_lock().map_err(|_| Error::AlreadyRunning)?;
        self.running.store(true, Ordering::Release);
        Ok(RunGuard { _slot: slot, running: &self.running })
    }

    /// One ingestion pass. Fails fast with [`Error::AlreadyRunning`] if
    /// another pass holds the slot. Per-document failures are logged and
    /// counted; only an unreachable frontier or id listing fails the run.
    pub async fn run(&self) -> Result<RunReport> {
        let _guard = self.try_begin().inspect_err(|_| tracing::debug!("update already in progress"))?;
        tracing::info!(concurrency = self.concurrency, "update started");

        let frontier = self
            .worker
            .source
            .frontier()
            .await
            .inspect_err(|err| tracing::error!(error = %err, "failed to get comics total"))
            .context("failed to get comics total")?;
        let present: HashSet<DocId> = self
            .worker
            .store
            .ids()
            .await
            .inspect_err(|err| tracing::error!(error = %err, "failed to get downloaded comics"))
            .context("failed to get downloaded comics")?
            .into_iter()
            .collect();

        let mut report = RunReport {
            frontier,
            already_present: present.iter().filter(|&&id| id >= 1 && id <= frontier).count(),
            ..RunReport::default()
        };
        tracing::debug!(frontier, present = report.already_present, "downloading missing comics");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for id in (1..=frontier).filter(|id| !present.contains(id)) {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(id, "shutdown requested, no further comics will be launched");
                    report.cancelled = true;
                    break;
                }
                permit = permits.clone().acquire_owned() => permit.context("ingestion permits closed")?,
            };
            let worker = self.worker.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (id, worker.ingest(id).await)
            });
            report.launched += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            report.record(joined);
        }
        tracing::info!(
            launched = report.launched,
            ingested = report.ingested,
            failed = report.failed,
            "update finished"
        );
        Ok(report)
    }

    /// Side-effect free; never waits on the single-flight slot.
    pub fn status(&self) -> RunStatus {
        if self.running.load(Ordering::Acquire) {
            RunStatus::Running
        } else {
            RunStatus::Idle
        }
    }

    /// Point-in-time aggregates, recomputed from the store on every call.
    pub async fn stats(&self) -> Result<Stats> {
        let comics_total = self.worker.source.frontier().await.context("failed to get comics total")?;
        let store = self.worker.store.stats().await.context("failed to get db stats")?;
        Ok(Stats { store, comics_total })
    }

    /// Fails when the store cannot list its comics.
    pub async fn check_store(&self) -> Result<()> {
        self.worker.store.ids().await.map(drop)
    }

    /// Fails when the catalog cannot report its latest comic.
    pub async fn check_source(&self) -> Result<()> {
        self.worker.source.frontier().await.map(drop)
    }

    pub async fn drop_all(&self) -> Result<()> {
        tracing::info!("dropping all comics");
        self.worker.store.truncate().await
    }
}
