use crate::DocId;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any work was done.
    #[error("bad arguments: {0}")]
    BadArguments(&'static str),
    /// Another ingestion run holds the single-flight slot.
    #[error("update already in progress")]
    AlreadyRunning,
    #[error("document {0} not found")]
    NotFound(DocId),
    /// Input the normalizer refuses to process. A client error, not a fault.
    #[error("phrase is {len} bytes, larger than {max}")]
    TooLarge { len: usize, max: usize },
    /// Source, store or normalizer failure.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl Error {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::BadArguments(_) | Error::TooLarge { .. })
    }
}
