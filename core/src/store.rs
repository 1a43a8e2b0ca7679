use crate::ports::Store;
use crate::{DocId, Document, Error, Result, StoreStats};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Process-local store, used by tests and by the server's `memory` mode.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<DocId, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.docs.read().len() }

    pub fn is_empty(&self) -> bool { self.docs.read().is_empty() }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(&self, doc: &Document) -> Result<()> {
        self.docs.write().insert(doc.id, doc.clone());
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<DocId>> {
        Ok(self.docs.read().keys().copied().collect())
    }

    async fn get(&self, id: DocId) -> Result<Document> {
        self.docs.read().get(&id).cloned().ok_or(Error::NotFound(id))
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats::from_documents(self.docs.read().values()))
    }

    async fn truncate(&self) -> Result<()> {
        self.docs.write().clear();
        Ok(())
    }
}
