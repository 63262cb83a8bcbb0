use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::StoreConfig;

/// Hex SHA-256 of an owner id. Used for file names and namespaces so that
/// arbitrary owner ids map to fixed-width, path-safe strings.
pub fn owner_digest(owner_id: &str) -> String {
    hex::encode(Sha256::digest(owner_id.as_bytes()))
}

/// Location of an owner's database file.
pub fn owner_db_path(config: &StoreConfig, owner_id: &str) -> PathBuf {
    config
        .data_dir
        .join(format!("{}.sqlite", owner_digest(owner_id)))
}

/// Open (creating if missing) the database of one owner.
pub async fn connect(config: &StoreConfig, owner_id: &str) -> Result<SqlitePool> {
    std::fs::create_dir_all(&config.data_dir)?;

    let options = SqliteConnectOptions::new()
        .filename(owner_db_path(config, owner_id))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_paths_are_distinct_and_contained() {
        let config = StoreConfig {
            data_dir: PathBuf::from("/data"),
            busy_timeout_ms: 1000,
            max_connections: 1,
        };
        let a = owner_db_path(&config, "alice");
        let b = owner_db_path(&config, "../../etc/passwd");
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(config.data_dir.as_path()));
        assert_eq!(b.parent(), Some(config.data_dir.as_path()));
        assert!(a.to_string_lossy().ends_with(".sqlite"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = owner_digest("alice");
        assert_eq!(d.len(), 64);
        assert_eq!(d, owner_digest("alice"));
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
