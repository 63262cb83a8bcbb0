//! Error taxonomy for vault operations.
//!
//! Trait seams ([`Store`](crate::store::Store),
//! [`EmbeddingProvider`](crate::embedding::EmbeddingProvider),
//! [`VectorIndex`](crate::vector::VectorIndex)) return `anyhow::Result`.
//! The public operations on [`Vault`](crate::Vault) classify those failures
//! into this enum so callers can tell a missing channel from a broken store.
//!
//! Malformed sort, filter or pagination input never produces an error:
//! it is replaced by safe defaults while the caller's parameters are
//! sanitised (see [`query`](crate::query)).

/// Result alias for vault operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel does not exist in this owner's store, or is not active.
    #[error("channel {0} not found or not accessible")]
    ChannelNotFound(String),

    /// The embedding provider failed. Contained by the pipeline and the
    /// search path; never returned from ingestion.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The vector index failed. Contained like [`Error::Embedding`].
    #[error("vector index error: {0}")]
    VectorIndex(String),

    /// The embedded store failed. Aborts the enclosing transaction.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ChannelNotFound(_))
    }
}
