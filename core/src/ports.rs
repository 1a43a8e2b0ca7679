//! Boundaries to the collaborators the core treats as black boxes.

use crate::{DocId, Document, RawDocument, Result, StoreStats};
use async_trait::async_trait;

/// The remote catalog documents are fetched from.
#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch(&self, id: DocId) -> Result<RawDocument>;
    /// Highest document id the catalog currently knows about.
    async fn frontier(&self) -> Result<DocId>;
}

/// Turns free text into an ordered set of normalized tokens.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, phrase: &str) -> Result<Vec<String>>;
}

/// Row storage for documents. Upserts are keyed by `Document::id`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert(&self, doc: &Document) -> Result<()>;
    async fn ids(&self) -> Result<Vec<DocId>>;
    async fn get(&self, id: DocId) -> Result<Document>;
    async fn stats(&self) -> Result<StoreStats>;
    async fn truncate(&self) -> Result<()>;
}
