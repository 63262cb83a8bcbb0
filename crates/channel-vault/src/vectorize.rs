//! Vector index clients.
//!
//! [`HttpVectorIndex`] speaks the Cloudflare Vectorize REST dialect:
//! `POST {url}/query` with a JSON body and `POST {url}/insert` with
//! newline-delimited JSON. [`DisabledIndex`] fails every call, which the
//! pipeline and search path absorb as a provider failure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use channel_vault_core::vector::{InMemoryVectorIndex, VectorIndex, VectorItem, VectorMatch, VectorQuery};

use crate::config::VectorIndexConfig;

pub struct DisabledIndex;

#[async_trait]
impl VectorIndex for DisabledIndex {
    async fn query(&self, _vector: &[f32], _options: &VectorQuery) -> Result<Vec<VectorMatch>> {
        bail!("Vector index is disabled")
    }

    async fn insert(&self, _items: Vec<VectorItem>) -> Result<()> {
        bail!("Vector index is disabled")
    }
}

pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpVectorIndex {
    /// The API token is optional; when the variable named by
    /// `api_token_env` is unset, requests go out unauthenticated.
    pub fn new(config: &VectorIndexConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("vector_index.url required for http provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            token: std::env::var(&config.api_token_env).ok(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(format!("{}/{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

pub fn query_body(vector: &[f32], options: &VectorQuery) -> serde_json::Value {
    let mut body = serde_json::json!({
        "vector": vector,
        "topK": options.top_k,
        "returnMetadata": if options.return_metadata { "all" } else { "none" },
    });
    if !options.namespace.is_empty() {
        body["namespace"] = serde_json::json!(options.namespace);
    }
    if !options.filter.is_empty() {
        body["filter"] = serde_json::json!(options.filter);
    }
    body
}

/// Encode items as newline-delimited JSON, one vector per line.
pub fn insert_body(items: &[VectorItem]) -> Result<String> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    Ok(out)
}

#[derive(Deserialize)]
struct QueryEnvelope {
    #[serde(default)]
    result: Option<QueryResult>,
    #[serde(default)]
    matches: Option<Vec<VectorMatch>>,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

/// Accepts both the wrapped (`{"result": {"matches": [...]}}`) and the bare
/// (`{"matches": [...]}`) response shapes.
pub fn parse_query_response(json: serde_json::Value) -> Result<Vec<VectorMatch>> {
    let envelope: QueryEnvelope =
        serde_json::from_value(json).context("Invalid vector query response")?;
    match (envelope.result, envelope.matches) {
        (Some(result), _) => Ok(result.matches),
        (None, Some(matches)) => Ok(matches),
        (None, None) => bail!("Invalid vector query response: missing matches"),
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(&self, vector: &[f32], options: &VectorQuery) -> Result<Vec<VectorMatch>> {
        let response = self
            .post("query")
            .json(&query_body(vector, options))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Vector index query error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_query_response(json)
    }

    async fn insert(&self, items: Vec<VectorItem>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let response = self
            .post("insert")
            .header("Content-Type", "application/x-ndjson")
            .body(insert_body(&items)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Vector index insert error {}: {}", status, body_text);
        }
        Ok(())
    }
}

/// Create the index selected by `config.provider`.
pub fn create_index(config: &VectorIndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledIndex)),
        "memory" => Ok(Arc::new(InMemoryVectorIndex::new())),
        "http" => Ok(Arc::new(HttpVectorIndex::new(config)?)),
        other => bail!("Unknown vector index provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn query_body_carries_namespace_and_filter() {
        let mut filter = BTreeMap::new();
        filter.insert("channel_id".to_string(), "c1".to_string());
        let options = VectorQuery {
            top_k: 5,
            namespace: "telegram-abc".to_string(),
            filter,
            return_metadata: true,
        };
        let body = query_body(&[0.5, 0.5], &options);
        assert_eq!(body["topK"], 5);
        assert_eq!(body["namespace"], "telegram-abc");
        assert_eq!(body["filter"]["channel_id"], "c1");
        assert_eq!(body["returnMetadata"], "all");
    }

    #[test]
    fn query_body_omits_empty_filter() {
        let body = query_body(&[1.0], &VectorQuery::default());
        assert!(body.get("filter").is_none());
        assert!(body.get("namespace").is_none());
    }

    #[test]
    fn insert_body_is_ndjson() {
        let mut metadata = BTreeMap::new();
        metadata.insert("channel_id".to_string(), "c1".to_string());
        let items = vec![
            VectorItem {
                id: "a".to_string(),
                values: vec![1.0],
                metadata: metadata.clone(),
                namespace: "ns".to_string(),
            },
            VectorItem {
                id: "b".to_string(),
                values: vec![0.0],
                metadata,
                namespace: "ns".to_string(),
            },
        ];
        let body = insert_body(&items).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "a");
        assert_eq!(first["namespace"], "ns");
        assert_eq!(first["metadata"]["channel_id"], "c1");
    }

    #[test]
    fn parses_both_response_shapes() {
        let wrapped = serde_json::json!({
            "success": true,
            "result": {"count": 1, "matches": [{"id": "r1", "score": 0.9}]}
        });
        let matches = parse_query_response(wrapped).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "r1");

        let bare = serde_json::json!({"matches": [{"id": "r2", "score": 0.4, "metadata": {"channel_id": "c1"}}]});
        let matches = parse_query_response(bare).unwrap();
        assert_eq!(matches[0].id, "r2");
        assert!(matches[0].metadata.is_some());
    }

    #[test]
    fn missing_matches_is_an_error() {
        assert!(parse_query_response(serde_json::json!({"success": false})).is_err());
    }

    #[test]
    fn http_requires_url() {
        let config = VectorIndexConfig {
            provider: "http".to_string(),
            ..Default::default()
        };
        assert!(create_index(&config).is_err());
    }
}
