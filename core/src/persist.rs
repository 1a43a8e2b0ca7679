use crate::ports::Store;
use crate::{DocId, Document, Error, Result, StoreStats};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::path::Path;

const DOCS_TREE: &str = "comics";

/// Documents persisted in a sled tree, keyed by big-endian id so iteration
/// yields ascending ids. Values are bincode-encoded [`Document`]s.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    docs: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("failed to open store at {}", path.display()))?;
        Self::from_db(db)
    }

    /// Store that lives only as long as the process.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open().context("failed to open temporary store")?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let docs = db.open_tree(DOCS_TREE).context("failed to open comics tree")?;
        Ok(Self { db, docs })
    }

    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.context("failed to flush store")?;
        Ok(())
    }

    fn documents(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::with_capacity(self.docs.len());
        for entry in self.docs.iter() {
            let (_, value) = entry.context("failed to scan comics")?;
            docs.push(decode(&value)?);
        }
        Ok(docs)
    }
}

fn key(id: DocId) -> [u8; 4] { id.to_be_bytes() }

fn decode_key(raw: &[u8]) -> Result<DocId> {
    let bytes: [u8; 4] = raw.try_into().map_err(|_| anyhow!("malformed key of {} bytes", raw.len()))?;
    Ok(DocId::from_be_bytes(bytes))
}

fn decode(raw: &[u8]) -> Result<Document> {
    let doc = bincode::deserialize(raw).context("failed to decode comic")?;
    Ok(doc)
}

#[async_trait]
impl Store for SledStore {
    async fn upsert(&self, doc: &Document) -> Result<()> {
        let bytes = bincode::serialize(doc).context("failed to encode comic")?;
        self.docs
            .insert(key(doc.id), bytes)
            .with_context(|| format!("failed to insert comic {}", doc.id))?;
        tracing::debug!(id = doc.id, url = %doc.url, "comic stored");
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<DocId>> {
        let mut ids = Vec::with_capacity(self.docs.len());
        for k in self.docs.iter().keys() {
            let k = k.context("failed to list comic ids")?;
            ids.push(decode_key(&k)?);
        }
        Ok(ids)
    }

    async fn get(&self, id: DocId) -> Result<Document> {
        match self.docs.get(key(id)).with_context(|| format!("failed to read comic {id}"))? {
            Some(value) => decode(&value),
            None => Err(Error::NotFound(id)),
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        let docs = self.documents()?;
        Ok(StoreStats::from_documents(&docs))
    }

    async fn truncate(&self) -> Result<()> {
        self.docs.clear().context("failed to truncate comics")?;
        self.flush().await?;
        tracing::debug!("comics truncated");
        Ok(())
    }
}
