use anyhow::Result;
use sqlx::SqlitePool;

/// Create the per-owner schema. Every statement is idempotent, so this runs
/// on each actor activation.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL UNIQUE,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT '',
            is_public INTEGER NOT NULL DEFAULT 0,
            is_free INTEGER NOT NULL DEFAULT 1,
            fee REAL NOT NULL DEFAULT 0,
            last_synced_at INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            text TEXT NOT NULL DEFAULT '',
            timestamp INTEGER NOT NULL,
            sender_id TEXT NOT NULL DEFAULT '',
            sender_username TEXT,
            sender_first_name TEXT,
            sender_last_name TEXT,
            vector_id TEXT,
            UNIQUE(channel_id, message_id),
            FOREIGN KEY (channel_id) REFERENCES channels(channel_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_channels_status ON channels(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_channels_updated_at ON channels(updated_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_records_channel_ts ON records(channel_id, timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_sender ON records(sender_id)")
        .execute(pool)
        .await?;

    Ok(())
}
