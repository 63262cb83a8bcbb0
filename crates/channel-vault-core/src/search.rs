//! Semantic search with threshold filtering and time-windowed context.
//!
//! The algorithm operates entirely through the [`Store`],
//! [`EmbeddingProvider`] and [`VectorIndex`] traits. The calling
//! application sanitises [`SearchParams`] into a [`SearchRequest`] and
//! passes the owner's namespace.
//!
//! # Algorithm
//!
//! 1. Embed the query. On failure, return an empty response with
//!    `semantic_search_available = false`.
//! 2. Query the vector index for `top_k` neighbours in the namespace,
//!    optionally filtered by `channel_id` metadata. A failing index
//!    degrades the same way as a failing provider.
//! 3. Drop matches scoring below `threshold`; drop repeated ids.
//! 4. Load each match with its active channel and re-apply the visibility
//!    filters exactly (the index filter is coarser and is not trusted).
//! 5. Load every record of that channel within
//!    `[timestamp - window, timestamp + window]`, ascending.
//! 6. Mark the matched record `is_match = true` with its score.
//! 7. Emit one group per match, in the index's rank order.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::models::{ChannelSummary, Record, RecordView, SearchGroup, SearchResponse};
use crate::store::Store;
use crate::vector::{VectorIndex, VectorMatch, VectorQuery};

/// Largest `top_k` forwarded to the vector index.
pub const MAX_TOP_K: usize = 100;

/// Defaults applied to parameters the caller leaves out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchDefaults {
    pub top_k: usize,
    pub threshold: f32,
    pub context_window_secs: i64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: 0.7,
            context_window_secs: 7200,
        }
    }
}

/// Raw search parameters as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub channel_id: Option<String>,
    pub top_k: Option<usize>,
    pub context_window_secs: Option<i64>,
    pub threshold: Option<f32>,
    pub is_public: Option<bool>,
    pub is_free: Option<bool>,
}

/// Exact secondary filters applied after the vector lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityFilter {
    pub is_public: Option<bool>,
    pub is_free: Option<bool>,
}

impl VisibilityFilter {
    pub fn accepts(&self, channel: &ChannelSummary) -> bool {
        self.is_public.map_or(true, |p| channel.is_public == p)
            && self.is_free.map_or(true, |f| channel.is_free == f)
    }
}

/// A sanitised search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub channel_id: Option<String>,
    pub top_k: usize,
    pub context_window_secs: i64,
    pub threshold: f32,
    pub filter: VisibilityFilter,
}

impl SearchParams {
    pub fn into_request(self, defaults: &SearchDefaults) -> SearchRequest {
        let top_k = match self.top_k {
            Some(k) if k >= 1 => k.min(MAX_TOP_K),
            _ => defaults.top_k,
        };
        let threshold = self
            .threshold
            .filter(|t| t.is_finite())
            .unwrap_or(defaults.threshold);
        let context_window_secs = self
            .context_window_secs
            .unwrap_or(defaults.context_window_secs)
            .max(0);

        SearchRequest {
            query: self.query,
            channel_id: self.channel_id.filter(|c| !c.trim().is_empty()),
            top_k,
            context_window_secs,
            threshold,
            filter: VisibilityFilter {
                is_public: self.is_public,
                is_free: self.is_free,
            },
        }
    }
}

/// Run a semantic search for one owner.
///
/// Provider and index failures never surface as errors; store failures do.
pub async fn search_records<S: Store + ?Sized>(
    store: &S,
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    namespace: &str,
    req: &SearchRequest,
) -> Result<SearchResponse> {
    if req.query.trim().is_empty() {
        return Ok(SearchResponse {
            results: Vec::new(),
            semantic_search_available: true,
        });
    }

    let query_vec = match embed_query(embedder, &req.query).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "query embedding failed; semantic search unavailable");
            return Ok(SearchResponse::unavailable());
        }
    };

    let mut filter = BTreeMap::new();
    if let Some(channel_id) = &req.channel_id {
        filter.insert("channel_id".to_string(), channel_id.clone());
    }
    let options = VectorQuery {
        top_k: req.top_k,
        namespace: namespace.to_string(),
        filter,
        return_metadata: true,
    };

    let matches = match index.query(&query_vec, &options).await {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "vector index query failed; semantic search unavailable");
            return Ok(SearchResponse::unavailable());
        }
    };

    let hits = surviving_matches(matches, req.threshold);
    debug!(hits = hits.len(), threshold = req.threshold, "vector matches above threshold");

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some((record, channel)) = store.search_hit(&hit.id).await? else {
            continue;
        };
        if let Some(channel_id) = &req.channel_id {
            if &record.channel_id != channel_id {
                continue;
            }
        }
        if !req.filter.accepts(&channel) {
            continue;
        }

        let window = req.context_window_secs;
        let context = store
            .records_between(
                &record.channel_id,
                record.timestamp.saturating_sub(window),
                record.timestamp.saturating_add(window),
            )
            .await?;

        results.push(SearchGroup {
            channel,
            records: annotate(context, &record, hit.score),
        });
    }

    Ok(SearchResponse {
        results,
        semantic_search_available: true,
    })
}

/// Keep matches at or above `threshold`, in descending score order, with
/// repeated ids dropped after their first (best) occurrence.
pub fn surviving_matches(mut matches: Vec<VectorMatch>, threshold: f32) -> Vec<VectorMatch> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| m.score >= threshold)
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

/// Mark the matched record in its context window.
///
/// The match is inserted if the context query did not return it, so that
/// every group carries exactly one `is_match` record.
pub fn annotate(context: Vec<Record>, matched: &Record, score: f32) -> Vec<RecordView> {
    let mut views: Vec<RecordView> = context
        .into_iter()
        .map(|record| {
            let is_match = record.id == matched.id;
            RecordView {
                record,
                is_match,
                similarity: is_match.then_some(score as f64),
            }
        })
        .collect();

    if !views.iter().any(|v| v.is_match) {
        let pos = views
            .iter()
            .position(|v| v.record.timestamp > matched.timestamp)
            .unwrap_or(views.len());
        views.insert(
            pos,
            RecordView {
                record: matched.clone(),
                is_match: true,
                similarity: Some(score as f64),
            },
        );
    }
    views
}
