#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use channel_vault::config::Config;
use channel_vault::models::{ChannelInput, RecordInput};
use channel_vault::registry::ActorRegistry;
use channel_vault::sqlite_store::SqliteStore;
use channel_vault_core::embedding::EmbeddingProvider;
use channel_vault_core::vector::{InMemoryVectorIndex, VectorIndex, VectorItem, VectorMatch, VectorQuery};

pub const DIMS: usize = 256;

/// Bag-of-words embedder: every distinct lowercase word gets its own
/// dimension, so cosine similarity is exact word overlap.
#[derive(Default)]
pub struct VocabEmbedder {
    vocab: Mutex<HashMap<String, usize>>,
}

impl VocabEmbedder {
    fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut v = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let next = vocab.len();
            let dim = *vocab.entry(word.to_lowercase()).or_insert(next);
            if dim >= DIMS {
                bail!("vocabulary exhausted");
            }
            v[dim] += 1.0;
        }
        Ok(v)
    }
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.vectorize(t)).collect()
    }
    fn model_name(&self) -> &str {
        "vocab-test"
    }
    fn dims(&self) -> usize {
        DIMS
    }
}

/// [`VocabEmbedder`] that fails its `fail_on`-th call (1-based).
pub struct FlakyEmbedder {
    inner: VocabEmbedder,
    calls: AtomicUsize,
    fail_on: usize,
}

impl FlakyEmbedder {
    pub fn failing_call(fail_on: usize) -> Self {
        Self {
            inner: VocabEmbedder::default(),
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            bail!("embedding service hiccup");
        }
        self.inner.embed(texts).await
    }
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> usize {
        DIMS
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unreachable")
    }
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        DIMS
    }
}

pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn query(&self, _vector: &[f32], _options: &VectorQuery) -> Result<Vec<VectorMatch>> {
        bail!("vector index unreachable")
    }
    async fn insert(&self, _items: Vec<VectorItem>) -> Result<()> {
        bail!("vector index unreachable")
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub registry: ActorRegistry,
    pub index: Arc<InMemoryVectorIndex>,
}

pub fn config(dir: &TempDir) -> Config {
    Config::with_data_dir(dir.path().join("owners"))
}

/// Registry with the vocabulary embedder and a shared in-memory index.
pub fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let index = Arc::new(InMemoryVectorIndex::new());
    let registry = ActorRegistry::new(
        config(&dir),
        Arc::new(VocabEmbedder::default()),
        index.clone(),
    );
    Harness {
        dir,
        registry,
        index,
    }
}

pub fn harness_with(
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
) -> (TempDir, ActorRegistry) {
    let dir = TempDir::new().unwrap();
    let registry = ActorRegistry::new(config(&dir), embedder, index);
    (dir, registry)
}

pub fn channel(channel_id: &str, title: &str) -> ChannelInput {
    ChannelInput {
        channel_id: channel_id.to_string(),
        title: title.to_string(),
        kind: "channel".to_string(),
        is_public: false,
        is_free: true,
        fee: 0.0,
    }
}

pub fn record(message_id: &str, text: &str, timestamp: i64) -> RecordInput {
    RecordInput {
        message_id: message_id.to_string(),
        text: text.to_string(),
        timestamp,
        sender_id: "u1".to_string(),
        sender_username: Some("alice".to_string()),
        sender_first_name: Some("Alice".to_string()),
        sender_last_name: None,
    }
}

/// A second connection to an owner's database, bypassing the actor.
pub async fn owner_store(registry: &ActorRegistry, owner_id: &str) -> SqliteStore {
    let store = SqliteStore::open(&registry.config().store, owner_id)
        .await
        .unwrap();
    assert_eq!(store.owner_id(), owner_id);
    store
}

/// Run one statement directly against an owner's database.
pub async fn execute(registry: &ActorRegistry, owner_id: &str, sql: &str) {
    let store = owner_store(registry, owner_id).await;
    sqlx::query(sql).execute(store.pool()).await.unwrap();
    store.close().await;
}
