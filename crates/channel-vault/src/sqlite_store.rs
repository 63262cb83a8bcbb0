//! SQLite-backed [`Store`] implementation for one owner.
//!
//! Listings are built with [`QueryBuilder`]: the only text ever pushed into
//! a statement comes from the fixed column names of
//! [`channel_vault_core::query`]; every filter value goes through
//! `push_bind`. The count query reuses the same filter builder as the page
//! query so both always agree.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use channel_vault_core::models::{
    Channel, ChannelInput, ChannelStatus, ChannelSummary, InsertOutcome, PendingEmbedding, Record,
    RecordInput, Stats,
};
use channel_vault_core::query::{like_contains, ChannelFilter, ChannelQuery, RecordFilter, RecordQuery};
use channel_vault_core::store::Store;

use crate::config::StoreConfig;
use crate::{db, migrate};

const CHANNEL_COLUMNS: &str = "c.id AS id, c.channel_id AS channel_id, c.owner_id AS owner_id, \
     c.title AS title, c.kind AS kind, c.is_public AS is_public, c.is_free AS is_free, \
     c.fee AS fee, c.last_synced_at AS last_synced_at, c.status AS status, \
     c.created_at AS created_at, c.updated_at AS updated_at, \
     (SELECT COUNT(*) FROM records r WHERE r.channel_id = c.channel_id) AS record_count";

const RECORD_COLUMNS: &str = "r.id AS id, r.message_id AS message_id, r.channel_id AS channel_id, \
     r.text AS text, r.timestamp AS timestamp, r.sender_id AS sender_id, \
     r.sender_username AS sender_username, r.sender_first_name AS sender_first_name, \
     r.sender_last_name AS sender_last_name, r.vector_id AS vector_id";

/// SQLite implementation of the [`Store`] trait, scoped to one owner.
pub struct SqliteStore {
    pool: SqlitePool,
    owner_id: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, owner_id: impl Into<String>) -> Self {
        Self {
            pool,
            owner_id: owner_id.into(),
        }
    }

    /// Connect to the owner's database and bring its schema up to date.
    pub async fn open(config: &StoreConfig, owner_id: &str) -> Result<Self> {
        let pool = db::connect(config, owner_id).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, owner_id))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn channel_from_row(row: &SqliteRow) -> Result<Channel, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Channel {
        id: row.try_get("id")?,
        channel_id: row.try_get("channel_id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        kind: row.try_get("kind")?,
        is_public: row.try_get("is_public")?,
        is_free: row.try_get("is_free")?,
        fee: row.try_get("fee")?,
        last_synced_at: row.try_get("last_synced_at")?,
        status: ChannelStatus::parse(&status).unwrap_or(ChannelStatus::Inactive),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        record_count: row.try_get("record_count")?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    Ok(Record {
        id: row.try_get("id")?,
        message_id: row.try_get("message_id")?,
        channel_id: row.try_get("channel_id")?,
        text: row.try_get("text")?,
        timestamp: row.try_get("timestamp")?,
        sender_id: row.try_get("sender_id")?,
        sender_username: row.try_get("sender_username")?,
        sender_first_name: row.try_get("sender_first_name")?,
        sender_last_name: row.try_get("sender_last_name")?,
        vector_id: row.try_get("vector_id")?,
    })
}

fn push_channel_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ChannelFilter) {
    qb.push(" WHERE c.status = ").push_bind(filter.status.as_str().to_string());
    if let Some(title) = &filter.title_contains {
        qb.push(" AND c.title LIKE ")
            .push_bind(like_contains(title))
            .push(" ESCAPE '\\'");
    }
    if let Some(is_public) = filter.is_public {
        qb.push(" AND c.is_public = ").push_bind(is_public);
    }
    if let Some(is_free) = filter.is_free {
        qb.push(" AND c.is_free = ").push_bind(is_free);
    }
}

fn push_record_filter(qb: &mut QueryBuilder<'_, Sqlite>, channel_id: &str, filter: &RecordFilter) {
    qb.push(" WHERE r.channel_id = ").push_bind(channel_id.to_string());
    if let Some(text) = &filter.text_contains {
        qb.push(" AND r.text LIKE ")
            .push_bind(like_contains(text))
            .push(" ESCAPE '\\'");
    }
    if let Some(sender_id) = &filter.sender_id {
        qb.push(" AND r.sender_id = ").push_bind(sender_id.clone());
    }
    if let Some(name) = &filter.sender_name_contains {
        let pattern = like_contains(name);
        qb.push(" AND (r.sender_username LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR r.sender_first_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR r.sender_last_name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(from) = filter.from_timestamp {
        qb.push(" AND r.timestamp >= ").push_bind(from);
    }
    if let Some(to) = filter.to_timestamp {
        qb.push(" AND r.timestamp <= ").push_bind(to);
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_channel(&self, item: &ChannelInput) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO channels (id, channel_id, owner_id, title, kind, is_public, is_free,
                                  fee, last_synced_at, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET
                title = excluded.title,
                kind = excluded.kind,
                is_public = excluded.is_public,
                is_free = excluded.is_free,
                fee = excluded.fee,
                last_synced_at = excluded.last_synced_at,
                status = 'active',
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.channel_id)
        .bind(&self.owner_id)
        .bind(&item.title)
        .bind(&item.kind)
        .bind(item.is_public)
        .bind(item.is_free)
        .bind(item.fee)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn active_channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        let sql = format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels c WHERE c.channel_id = ? AND c.status = 'active'"
        );
        let row = sqlx::query(&sql)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(channel_from_row).transpose()?)
    }

    async fn insert_records(&self, channel_id: &str, items: &[RecordInput]) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = InsertOutcome::default();

        for item in items {
            let id = Uuid::new_v4().to_string();
            let result = sqlx::query(
                r#"
                INSERT INTO records (id, message_id, channel_id, text, timestamp, sender_id,
                                     sender_username, sender_first_name, sender_last_name)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(channel_id, message_id) DO NOTHING
                "#,
            )
            .bind(&id)
            .bind(&item.message_id)
            .bind(channel_id)
            .bind(&item.text)
            .bind(item.timestamp)
            .bind(&item.sender_id)
            .bind(&item.sender_username)
            .bind(&item.sender_first_name)
            .bind(&item.sender_last_name)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                continue;
            }
            outcome.inserted += 1;
            if !item.text.trim().is_empty() {
                outcome.to_embed.push(PendingEmbedding {
                    record_id: id,
                    channel_id: channel_id.to_string(),
                    text: item.text.clone(),
                });
            }
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE channels SET last_synced_at = ?, updated_at = ? WHERE channel_id = ?")
            .bind(now)
            .bind(now)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    async fn link_vectors(&self, links: &[(String, String)]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;

        for (record_id, vector_id) in links {
            let result =
                sqlx::query("UPDATE records SET vector_id = ? WHERE id = ? AND vector_id IS NULL")
                    .bind(vector_id)
                    .bind(record_id)
                    .execute(&mut *tx)
                    .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_channels(&self, query: &ChannelQuery) -> Result<(Vec<Channel>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM channels c");
        push_channel_filter(&mut count, &query.filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {CHANNEL_COLUMNS} FROM channels c"));
        push_channel_filter(&mut qb, &query.filter);
        qb.push(" ORDER BY c.")
            .push(query.sort.column())
            .push(" ")
            .push(query.direction.as_sql())
            .push(", c.id ASC LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let channels = rows
            .iter()
            .map(channel_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((channels, total))
    }

    async fn list_records(&self, channel_id: &str, query: &RecordQuery) -> Result<(Vec<Record>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records r");
        push_record_filter(&mut count, channel_id, &query.filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {RECORD_COLUMNS} FROM records r"));
        push_record_filter(&mut qb, channel_id, &query.filter);
        qb.push(" ORDER BY r.")
            .push(query.sort.column())
            .push(" ")
            .push(query.direction.as_sql())
            .push(", r.rowid ASC LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((records, total))
    }

    async fn search_hit(&self, record_id: &str) -> Result<Option<(Record, ChannelSummary)>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS}, c.id AS c_id, c.title AS c_title, c.kind AS c_kind, \
             c.is_public AS c_is_public, c.is_free AS c_is_free \
             FROM records r JOIN channels c ON c.channel_id = r.channel_id \
             WHERE r.id = ? AND c.status = 'active'"
        );
        let row = sqlx::query(&sql)
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = record_from_row(&row)?;
        let channel = ChannelSummary {
            id: row.try_get("c_id")?,
            channel_id: record.channel_id.clone(),
            title: row.try_get("c_title")?,
            kind: row.try_get("c_kind")?,
            is_public: row.try_get("c_is_public")?,
            is_free: row.try_get("c_is_free")?,
        };
        Ok(Some((record, channel)))
    }

    async fn records_between(&self, channel_id: &str, from: i64, to: i64) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records r \
             WHERE r.channel_id = ? AND r.timestamp >= ? AND r.timestamp <= ? \
             ORDER BY r.timestamp ASC, r.rowid ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(channel_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM channels) AS total_channels,
                (SELECT COUNT(*) FROM records) AS total_records,
                (SELECT COUNT(*) FROM records WHERE vector_id IS NOT NULL) AS embedded_records
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_channels: row.try_get("total_channels")?,
            total_records: row.try_get("total_records")?,
            embedded_records: row.try_get("embedded_records")?,
        })
    }
}
