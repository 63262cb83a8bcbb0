//! # Channel Vault
//!
//! Per-owner mirrors of externally sourced channels and their records, with
//! filtered listings and semantic search.
//!
//! Every owner has a private SQLite database and a single worker task
//! ([`actor`]) that serialises all of that owner's operations. The
//! [`registry::ActorRegistry`] starts workers on demand. Embeddings are
//! produced in the background after each sync and stored in an external
//! vector index under a per-owner namespace.
//!
//! ```rust,no_run
//! # async fn demo() -> channel_vault::Result<()> {
//! use channel_vault::config::Config;
//! use channel_vault::registry::ActorRegistry;
//! use channel_vault::models::ChannelInput;
//!
//! let registry = ActorRegistry::from_config(Config::with_data_dir("./data"))?;
//! let owner = registry.handle("owner-1").await?;
//! let channel: ChannelInput =
//!     serde_json::from_str(r#"{"channel_id": "c1", "title": "Alpha"}"#).unwrap();
//! owner.sync_channels(vec![channel]).await?;
//! registry.shutdown_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! The storage-agnostic logic lives in [`channel_vault_core`].

pub mod actor;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod registry;
pub mod sqlite_store;
pub mod vectorize;

pub use channel_vault_core::{models, query, search};
pub use error::{Error, Result};
