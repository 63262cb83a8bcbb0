//! In-memory [`VectorIndex`] for tests and single-process deployments.
//!
//! Vectors live in a `Vec` behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over the requested namespace.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{VectorIndex, VectorItem, VectorMatch, VectorQuery};

pub struct InMemoryVectorIndex {
    items: RwLock<Vec<VectorItem>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored vectors across all namespaces.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(&self, vector: &[f32], options: &VectorQuery) -> Result<Vec<VectorMatch>> {
        let items = self
            .items
            .read()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;

        let mut matches: Vec<VectorMatch> = items
            .iter()
            .filter(|item| item.namespace == options.namespace)
            .filter(|item| {
                options
                    .filter
                    .iter()
                    .all(|(k, v)| item.metadata.get(k) == Some(v))
            })
            .map(|item| VectorMatch {
                id: item.id.clone(),
                score: cosine_similarity(vector, &item.values),
                metadata: options
                    .return_metadata
                    .then(|| serde_json::json!(item.metadata)),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(options.top_k);
        Ok(matches)
    }

    async fn insert(&self, new_items: Vec<VectorItem>) -> Result<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;
        for item in new_items {
            items.retain(|existing| !(existing.id == item.id && existing.namespace == item.namespace));
            items.push(item);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(id: &str, ns: &str, channel: &str, values: Vec<f32>) -> VectorItem {
        let mut metadata = BTreeMap::new();
        metadata.insert("channel_id".to_string(), channel.to_string());
        VectorItem {
            id: id.to_string(),
            values,
            metadata,
            namespace: ns.to_string(),
        }
    }

    #[tokio::test]
    async fn test_query_ranks_and_scopes() {
        let index = InMemoryVectorIndex::new();
        index
            .insert(vec![
                item("a", "ns1", "c1", vec![1.0, 0.0]),
                item("b", "ns1", "c2", vec![0.7, 0.7]),
                item("c", "ns2", "c1", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let options = VectorQuery {
            top_k: 10,
            namespace: "ns1".to_string(),
            ..Default::default()
        };
        let matches = index.query(&[1.0, 0.0], &options).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(matches[0].metadata.is_none());

        let mut filter = BTreeMap::new();
        filter.insert("channel_id".to_string(), "c2".to_string());
        let options = VectorQuery {
            top_k: 10,
            namespace: "ns1".to_string(),
            filter,
            return_metadata: true,
        };
        let matches = index.query(&[1.0, 0.0], &options).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "b");
        assert_eq!(matches[0].metadata.as_ref().unwrap()["channel_id"], "c2");
    }

    #[tokio::test]
    async fn test_insert_overwrites_same_id() {
        let index = InMemoryVectorIndex::new();
        index.insert(vec![item("a", "ns", "c1", vec![1.0, 0.0])]).await.unwrap();
        index.insert(vec![item("a", "ns", "c1", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.len(), 1);
    }
}
