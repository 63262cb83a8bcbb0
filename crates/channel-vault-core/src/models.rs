//! Core data models shared by the store, the sync path and search.
//!
//! A [`Channel`] is an externally sourced grouping (a chat, a thread) and a
//! [`Record`] is one timestamped item inside it. Both are mirrored into a
//! per-owner store; records are immutable except for `vector_id`, which is
//! set once by the embedding pipeline.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a channel.
///
/// Every sync that references a channel forces it back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Active,
    Inactive,
}

impl ChannelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelStatus::Active => "active",
            ChannelStatus::Inactive => "inactive",
        }
    }

    /// Parse a status string, case-insensitively. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ChannelStatus::Active),
            "inactive" => Some(ChannelStatus::Inactive),
            _ => None,
        }
    }
}

/// A channel row as stored for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    /// Internal UUID.
    pub id: String,
    /// Externally sourced id, unique per owner.
    pub channel_id: String,
    pub owner_id: String,
    pub title: String,
    /// Source-specific kind (e.g. `"group"`, `"channel"`, `"private"`).
    pub kind: String,
    pub is_public: bool,
    pub is_free: bool,
    pub fee: f64,
    /// Unix seconds of the last sync that touched this channel.
    pub last_synced_at: Option<i64>,
    pub status: ChannelStatus,
    pub created_at: i64,
    pub updated_at: i64,
    /// Number of records stored for this channel.
    pub record_count: i64,
}

impl Channel {
    pub fn summary(&self) -> ChannelSummary {
        ChannelSummary {
            id: self.id.clone(),
            channel_id: self.channel_id.clone(),
            title: self.title.clone(),
            kind: self.kind.clone(),
            is_public: self.is_public,
            is_free: self.is_free,
        }
    }
}

/// The channel fields attached to record listings and search groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub kind: String,
    pub is_public: bool,
    pub is_free: bool,
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Internal UUID. Also used as the vector id.
    pub id: String,
    /// Externally sourced id, unique within the channel.
    pub message_id: String,
    /// External id of the owning channel.
    pub channel_id: String,
    pub text: String,
    /// External timestamp, monotonic within a channel.
    pub timestamp: i64,
    pub sender_id: String,
    pub sender_username: Option<String>,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub vector_id: Option<String>,
}

/// A record inside a search group, annotated with match information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: Record,
    pub is_match: bool,
    pub similarity: Option<f64>,
}

/// Channel metadata submitted by a sync call.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInput {
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub is_free: bool,
    #[serde(default)]
    pub fee: f64,
}

fn default_true() -> bool {
    true
}

/// A record submitted by a sync call.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInput {
    pub message_id: String,
    #[serde(default)]
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub sender_first_name: Option<String>,
    #[serde(default)]
    pub sender_last_name: Option<String>,
}

/// A newly inserted, non-empty record waiting for an embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEmbedding {
    pub record_id: String,
    pub channel_id: String,
    pub text: String,
}

/// Outcome of a transactional record insert.
#[derive(Debug, Clone, Default)]
pub struct InsertOutcome {
    pub inserted: u64,
    pub to_embed: Vec<PendingEmbedding>,
}

/// One search hit expanded into its surrounding context.
#[derive(Debug, Clone, Serialize)]
pub struct SearchGroup {
    pub channel: ChannelSummary,
    /// Context records ordered by timestamp ascending; exactly one has
    /// `is_match = true`.
    pub records: Vec<RecordView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchGroup>,
    pub semantic_search_available: bool,
}

impl SearchResponse {
    pub fn unavailable() -> Self {
        Self {
            results: Vec::new(),
            semantic_search_available: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelPage {
    pub channels: Vec<Channel>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub channel: ChannelSummary,
    pub records: Vec<Record>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_channels: i64,
    pub total_records: i64,
    /// Records whose `vector_id` has been linked.
    pub embedded_records: i64,
}
