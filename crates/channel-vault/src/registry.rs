//! Lazily populated map from owner id to running actor.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use channel_vault_core::embedding::EmbeddingProvider;
use channel_vault_core::vector::VectorIndex;
use channel_vault_core::Vault;

use crate::actor::{self, OwnerHandle};
use crate::config::Config;
use crate::db::owner_digest;
use crate::embedding::create_provider;
use crate::error::{Error, Result};
use crate::sqlite_store::SqliteStore;
use crate::vectorize::create_index;

/// Hex characters of the owner digest used in a vector namespace.
const NAMESPACE_DIGEST_LEN: usize = 16;

/// The vector index namespace of one owner.
pub fn namespace_for(prefix: &str, owner_id: &str) -> String {
    let digest = owner_digest(owner_id);
    format!("{}-{}", prefix, &digest[..NAMESPACE_DIGEST_LEN])
}

/// Owns every owner actor in the process.
///
/// The embedding provider and the vector index are shared by all actors.
/// An actor is started on the first [`handle`](ActorRegistry::handle) call
/// for its owner and restarted if it has stopped since.
pub struct ActorRegistry {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    actors: Mutex<HashMap<String, OwnerHandle>>,
}

impl ActorRegistry {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            config,
            embedder,
            index,
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// Build the provider and index named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        crate::config::validate(&config).map_err(|e| Error::Config(e.to_string()))?;
        let embedder = create_provider(&config.embedding)?;
        let index = create_index(&config.vector_index)?;
        Ok(Self::new(config, embedder, index))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Return the handle of `owner_id`'s actor, starting it if needed.
    ///
    /// Starting an actor opens the owner's database and runs migrations.
    /// That happens outside the registry lock, so a slow activation never
    /// delays callers of other owners.
    pub async fn handle(&self, owner_id: &str) -> Result<OwnerHandle> {
        if let Some(handle) = self.running(owner_id).await {
            return Ok(handle);
        }

        let store = SqliteStore::open(&self.config.store, owner_id).await?;

        let mut actors = self.actors.lock().await;
        // Another caller may have started the actor while the store was opening.
        let existing = actors.get(owner_id).filter(|h| !h.is_closed()).cloned();
        if let Some(handle) = existing {
            drop(actors);
            store.close().await;
            return Ok(handle);
        }

        let vault = Vault::new(
            Arc::new(store),
            Arc::clone(&self.embedder),
            Arc::clone(&self.index),
            namespace_for(&self.config.vector_index.namespace_prefix, owner_id),
        )
        .with_search_defaults(self.config.search.defaults())
        .with_batch_size(self.config.embedding.batch_size);

        let handle = actor::spawn(owner_id, vault, self.config.actor.mailbox_capacity);
        actors.insert(owner_id.to_string(), handle.clone());
        info!(owner_id, "owner actor started");

        Ok(handle)
    }

    /// The live handle for `owner_id`, if any. A stopped one is removed.
    async fn running(&self, owner_id: &str) -> Option<OwnerHandle> {
        let mut actors = self.actors.lock().await;
        match actors.get(owner_id) {
            Some(handle) if !handle.is_closed() => Some(handle.clone()),
            Some(_) => {
                debug!(owner_id, "owner actor stopped; restarting");
                actors.remove(owner_id);
                None
            }
            None => None,
        }
    }

    /// Number of owners with a running actor. Stopped actors are forgotten.
    pub async fn active_owners(&self) -> usize {
        let mut actors = self.actors.lock().await;
        actors.retain(|_, h| !h.is_closed());
        actors.len()
    }

    /// Stop every actor, waiting for queued commands and embedding jobs.
    pub async fn shutdown_all(&self) {
        let handles: Vec<OwnerHandle> = self.actors.lock().await.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.shutdown().await;
        }
        info!(stopped = handles.len(), "all owner actors stopped");
    }
}
