//! Allowlisted filter, sort and pagination model for listings.
//!
//! Callers hand in loosely typed [`ChannelListParams`] / [`RecordListParams`].
//! Sanitisation maps them onto closed enums whose SQL identifiers are fixed
//! `&'static str` column references, so a store implementation only ever
//! interpolates text from this module into a query. Every filter value
//! stays a bound parameter.
//!
//! Invalid input is never rejected. An unknown sort key falls back to the
//! default column, an unknown direction to the default direction, an
//! unknown status to `active`, and out-of-range pagination is clamped.

use serde::Deserialize;

use crate::models::ChannelStatus;

/// Default page size when the caller gives none.
pub const DEFAULT_LIMIT: i64 = 100;
/// Largest page a caller can request.
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `"asc"` (any case) selects ascending; anything else falls back to `default`.
    pub fn parse_or(raw: Option<&str>, default: SortDirection) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "asc" => SortDirection::Asc,
            Some(s) if s == "desc" => SortDirection::Desc,
            _ => default,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sortable channel columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSort {
    #[default]
    UpdatedAt,
    CreatedAt,
    Title,
    LastSyncedAt,
}

impl ChannelSort {
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("updated_at") => ChannelSort::UpdatedAt,
            Some("created_at") => ChannelSort::CreatedAt,
            Some("title") => ChannelSort::Title,
            Some("last_synced_at") => ChannelSort::LastSyncedAt,
            _ => ChannelSort::default(),
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            ChannelSort::UpdatedAt => "updated_at",
            ChannelSort::CreatedAt => "created_at",
            ChannelSort::Title => "title",
            ChannelSort::LastSyncedAt => "last_synced_at",
        }
    }
}

/// Sortable record columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSort {
    #[default]
    Timestamp,
    ExternalMessageId,
}

impl RecordSort {
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("timestamp") => RecordSort::Timestamp,
            Some("external_message_id") | Some("message_id") => RecordSort::ExternalMessageId,
            _ => RecordSort::default(),
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            RecordSort::Timestamp => "timestamp",
            RecordSort::ExternalMessageId => "message_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l >= 1 => l.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        let offset = offset.unwrap_or(0).max(0);
        Self { limit, offset }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Build a `LIKE` pattern matching `needle` anywhere in the column.
///
/// `%`, `_` and `\` in the needle are escaped with `\`; the pattern must be
/// used with `ESCAPE '\'`.
pub fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

/// Raw channel listing parameters as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelListParams {
    pub title: Option<String>,
    pub is_public: Option<bool>,
    pub is_free: Option<bool>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFilter {
    pub title_contains: Option<String>,
    pub is_public: Option<bool>,
    pub is_free: Option<bool>,
    pub status: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelQuery {
    pub filter: ChannelFilter,
    pub sort: ChannelSort,
    pub direction: SortDirection,
    pub page: Pagination,
}

impl ChannelListParams {
    pub fn into_query(self) -> ChannelQuery {
        let status = self
            .status
            .as_deref()
            .and_then(ChannelStatus::parse)
            .unwrap_or_default();
        ChannelQuery {
            filter: ChannelFilter {
                title_contains: non_empty(self.title),
                is_public: self.is_public,
                is_free: self.is_free,
                status,
            },
            sort: ChannelSort::parse_or_default(self.sort_by.as_deref()),
            direction: SortDirection::parse_or(self.sort_order.as_deref(), SortDirection::Desc),
            page: Pagination::new(self.limit, self.offset),
        }
    }
}

/// Raw record listing parameters as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordListParams {
    pub text: Option<String>,
    pub sender_id: Option<String>,
    pub sender_username: Option<String>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordFilter {
    pub text_contains: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name_contains: Option<String>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub sort: RecordSort,
    pub direction: SortDirection,
    pub page: Pagination,
}

impl RecordListParams {
    pub fn into_query(self) -> RecordQuery {
        RecordQuery {
            filter: RecordFilter {
                text_contains: non_empty(self.text),
                sender_id: non_empty(self.sender_id),
                sender_name_contains: non_empty(self.sender_username),
                from_timestamp: self.from_timestamp,
                to_timestamp: self.to_timestamp,
            },
            sort: RecordSort::parse_or_default(self.sort_by.as_deref()),
            direction: SortDirection::parse_or(self.sort_order.as_deref(), SortDirection::Desc),
            page: Pagination::new(self.limit, self.offset),
        }
    }
}
