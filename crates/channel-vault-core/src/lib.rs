//! # Channel Vault Core
//!
//! Shared, runtime-free logic for Channel Vault: data models, the
//! allowlisted query model, the store abstraction, the embedding pipeline
//! and the semantic search algorithm.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem dependencies.
//! Storage, provider clients and scheduling live in the `channel-vault`
//! application crate, which plugs them in through the [`store::Store`],
//! [`embedding::EmbeddingProvider`] and [`vector::VectorIndex`] traits.

pub mod embedding;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod search;
pub mod store;
pub mod vault;
pub mod vector;

pub use error::{Error, Result};
pub use vault::Vault;
