//! The public operations of one owner's vault.
//!
//! [`Vault`] bundles a [`Store`] with the embedding provider, the vector
//! index and the owner's namespace, and implements the six operations the
//! application exposes: stats, channel and record listings, semantic
//! search, and the two sync calls.
//!
//! A `Vault` does no scheduling of its own. Serialising calls per owner and
//! launching the [`EmbedJob`] returned by [`Vault::sync_records`] in the
//! background are the caller's job.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::{ChannelInput, ChannelPage, RecordInput, RecordPage, SearchResponse, Stats};
use crate::pipeline::{EmbedJob, DEFAULT_BATCH_SIZE};
use crate::query::{ChannelListParams, RecordListParams};
use crate::search::{self, SearchDefaults, SearchParams};
use crate::store::Store;
use crate::vector::VectorIndex;

/// Result of [`Vault::sync_records`].
pub struct SyncedRecords<S: Store> {
    /// Records inserted by this call; duplicates are not counted.
    pub inserted: u64,
    /// Embedding work for the new records, if any have text.
    pub job: Option<EmbedJob<S>>,
}

pub struct Vault<S: Store> {
    store: Arc<S>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    search_defaults: SearchDefaults,
    batch_size: usize,
}

impl<S: Store> Vault<S> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            namespace: namespace.into(),
            search_defaults: SearchDefaults::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_search_defaults(mut self, defaults: SearchDefaults) -> Self {
        self.search_defaults = defaults;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        Ok(self.store.stats().await?)
    }

    pub async fn list_channels(&self, params: ChannelListParams) -> Result<ChannelPage> {
        let query = params.into_query();
        let (channels, total_count) = self.store.list_channels(&query).await?;
        Ok(ChannelPage {
            channels,
            total_count,
            limit: query.page.limit,
            offset: query.page.offset,
        })
    }

    /// List a channel's records. Fails with [`Error::ChannelNotFound`] when
    /// the channel is unknown or inactive.
    pub async fn list_records(&self, channel_id: &str, params: RecordListParams) -> Result<RecordPage> {
        let channel = self
            .store
            .active_channel(channel_id)
            .await?
            .ok_or_else(|| Error::ChannelNotFound(channel_id.to_string()))?;

        let query = params.into_query();
        let (records, total_count) = self.store.list_records(channel_id, &query).await?;
        Ok(RecordPage {
            channel: channel.summary(),
            records,
            total_count,
            limit: query.page.limit,
            offset: query.page.offset,
        })
    }

    pub async fn search_records(&self, params: SearchParams) -> Result<SearchResponse> {
        let req = params.into_request(&self.search_defaults);
        search::search_records(
            self.store.as_ref(),
            self.embedder.as_ref(),
            self.index.as_ref(),
            &self.namespace,
            &req,
        )
        .await
    }

    /// Upsert each channel independently. Failing items are logged and
    /// skipped; the return value counts the items that succeeded.
    pub async fn sync_channels(&self, items: &[ChannelInput]) -> Result<u64> {
        let mut processed = 0u64;
        for item in items {
            if item.channel_id.trim().is_empty() {
                warn!("skipping channel without an external id");
                continue;
            }
            match self.store.upsert_channel(item).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    warn!(error = %e, channel_id = %item.channel_id, "channel sync failed");
                }
            }
        }
        debug!(processed, submitted = items.len(), "channels synced");
        Ok(processed)
    }

    /// Insert new records into an active channel.
    ///
    /// The insert is one transaction; on commit the returned job (if any)
    /// carries the new non-empty records for the embedding pipeline,
    /// batched by `batch_size` or the vault default.
    pub async fn sync_records(
        &self,
        channel_id: &str,
        items: &[RecordInput],
        batch_size: Option<usize>,
    ) -> Result<SyncedRecords<S>> {
        if self.store.active_channel(channel_id).await?.is_none() {
            return Err(Error::ChannelNotFound(channel_id.to_string()));
        }

        let outcome = self.store.insert_records(channel_id, items).await?;
        debug!(
            channel_id,
            inserted = outcome.inserted,
            submitted = items.len(),
            "records synced"
        );

        let job = (!outcome.to_embed.is_empty()).then(|| EmbedJob {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            index: Arc::clone(&self.index),
            namespace: self.namespace.clone(),
            batch_size: batch_size.filter(|b| *b > 0).unwrap_or(self.batch_size),
            items: outcome.to_embed,
        });

        Ok(SyncedRecords {
            inserted: outcome.inserted,
            job,
        })
    }
}
