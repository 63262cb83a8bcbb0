//! Storage abstraction for one owner's mirrored channels and records.
//!
//! The [`Store`] trait defines every storage operation the sync path, the
//! embedding pipeline, listings and search need. An implementation is
//! scoped to a single owner: there is no owner argument and no cross-owner
//! surface.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Channel, ChannelInput, ChannelSummary, InsertOutcome, Record, RecordInput, Stats};
use crate::query::{ChannelQuery, RecordQuery};

/// Abstract per-owner storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_channel`](Store::upsert_channel) | Insert or refresh channel metadata |
/// | [`active_channel`](Store::active_channel) | Look up an active channel by external id |
/// | [`insert_records`](Store::insert_records) | Transactional, deduplicating bulk insert |
/// | [`link_vectors`](Store::link_vectors) | Set `vector_id` on records that have none |
/// | [`list_channels`](Store::list_channels) | Filtered, sorted, paginated channels |
/// | [`list_records`](Store::list_records) | Filtered, sorted, paginated records |
/// | [`search_hit`](Store::search_hit) | Record joined with its active channel |
/// | [`records_between`](Store::records_between) | Time-windowed channel context |
/// | [`stats`](Store::stats) | Row counts |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a channel, or update its metadata in place when the external
    /// id is already known. Either way `last_synced_at` is refreshed and the
    /// status forced to active.
    async fn upsert_channel(&self, item: &ChannelInput) -> Result<()>;

    /// Fetch a channel by external id, only if it is active.
    async fn active_channel(&self, channel_id: &str) -> Result<Option<Channel>>;

    /// Insert records into a channel inside a single transaction.
    ///
    /// Items whose `(channel_id, message_id)` already exists (in the store
    /// or earlier in `items`) are skipped. Inserts happen in input order.
    /// The channel's `last_synced_at` is refreshed in the same transaction.
    /// Newly inserted records with non-blank text are returned for embedding.
    async fn insert_records(&self, channel_id: &str, items: &[RecordInput]) -> Result<InsertOutcome>;

    /// Set `vector_id` for each `(record_id, vector_id)` pair whose record
    /// has no vector id yet. Returns the number of records updated.
    async fn link_vectors(&self, links: &[(String, String)]) -> Result<u64>;

    /// Return one page of channels and the total count for the same filter.
    async fn list_channels(&self, query: &ChannelQuery) -> Result<(Vec<Channel>, i64)>;

    /// Return one page of a channel's records and the total count for the
    /// same filter. The caller checks channel existence first.
    async fn list_records(&self, channel_id: &str, query: &RecordQuery) -> Result<(Vec<Record>, i64)>;

    /// Load a record by internal id together with its channel, only if the
    /// channel is active.
    async fn search_hit(&self, record_id: &str) -> Result<Option<(Record, ChannelSummary)>>;

    /// All records of a channel with `from <= timestamp <= to`, ascending.
    async fn records_between(&self, channel_id: &str, from: i64, to: i64) -> Result<Vec<Record>>;

    async fn stats(&self) -> Result<Stats>;
}
