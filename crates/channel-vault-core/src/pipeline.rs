//! Best-effort embedding pipeline for newly ingested records.
//!
//! A sync call that inserts records produces an [`EmbedJob`]. The caller
//! launches it after the ingestion transaction has committed; the job
//! never reports back into the sync response.
//!
//! # Per batch
//!
//! 1. Embed the batch texts (order preserved).
//! 2. Build one [`VectorItem`] per record, keyed by the record id, with
//!    metadata `{record_id, channel_id}` in the owner's namespace.
//! 3. Insert into the vector index.
//! 4. Link `vector_id` back onto the records in the store.
//!
//! A failing batch is logged and counted. It does not affect other batches
//! or the already committed records, which simply stay without a vector id.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::Error;
use crate::models::PendingEmbedding;
use crate::store::Store;
use crate::vector::{VectorIndex, VectorItem};

/// Default number of records embedded per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Counts from one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub embedded: u64,
    pub failed: u64,
}

/// A queued unit of embedding work for one sync call.
pub struct EmbedJob<S: Store + ?Sized> {
    pub store: Arc<S>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub namespace: String,
    pub batch_size: usize,
    pub items: Vec<PendingEmbedding>,
}

impl<S: Store + ?Sized> EmbedJob<S> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Process every batch, isolating failures per batch.
    pub async fn run(self) -> PipelineReport {
        let mut report = PipelineReport::default();
        let batch_size = self.batch_size.max(1);

        for batch in self.items.chunks(batch_size) {
            match self.embed_batch(batch).await {
                Ok(linked) => {
                    report.embedded += linked;
                    report.failed += batch.len() as u64 - linked.min(batch.len() as u64);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        batch = batch.len(),
                        namespace = %self.namespace,
                        "embedding batch failed; records stay without vectors"
                    );
                    report.failed += batch.len() as u64;
                }
            }
        }

        debug!(
            embedded = report.embedded,
            failed = report.failed,
            namespace = %self.namespace,
            "embedding pipeline finished"
        );
        report
    }

    async fn embed_batch(&self, batch: &[PendingEmbedding]) -> Result<u64, Error> {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let items: Vec<VectorItem> = batch
            .iter()
            .zip(vectors)
            .map(|(pending, values)| VectorItem {
                id: pending.record_id.clone(),
                values,
                metadata: vector_metadata(pending),
                namespace: self.namespace.clone(),
            })
            .collect();

        self.index
            .insert(items)
            .await
            .map_err(|e| Error::VectorIndex(e.to_string()))?;

        let links: Vec<(String, String)> = batch
            .iter()
            .map(|p| (p.record_id.clone(), p.record_id.clone()))
            .collect();

        Ok(self.store.link_vectors(&links).await?)
    }
}

fn vector_metadata(pending: &PendingEmbedding) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("record_id".to_string(), pending.record_id.clone());
    metadata.insert("channel_id".to_string(), pending.channel_id.clone());
    metadata
}
