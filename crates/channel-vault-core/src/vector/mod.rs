//! Vector index abstraction.
//!
//! The vector index is an external, multi-tenant service shared by every
//! owner. Isolation is achieved with a per-owner namespace plus equality
//! metadata filters, never with locking.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::InMemoryVectorIndex;

/// One vector to upsert.
#[derive(Debug, Clone, Serialize)]
pub struct VectorItem {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
    pub namespace: String,
}

/// Options for a nearest-neighbour query.
#[derive(Debug, Clone, Default)]
pub struct VectorQuery {
    pub top_k: usize,
    pub namespace: String,
    /// Equality filter on metadata keys. Empty means no filter.
    pub filter: BTreeMap<String, String>,
    pub return_metadata: bool,
}

/// A nearest-neighbour match, in the index's native rank order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` matches, highest score first.
    async fn query(&self, vector: &[f32], options: &VectorQuery) -> Result<Vec<VectorMatch>>;

    /// Insert (or overwrite) vectors by id.
    async fn insert(&self, items: Vec<VectorItem>) -> Result<()>;
}
