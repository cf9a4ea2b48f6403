//! libSQL backend — async `Storage` implementation over a local database.
//!
//! Per-guild keyed records with single-statement atomic updates. Supports
//! local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, Value, params};
use tracing::{debug, info};

use crate::config::GuildConfig;
use crate::error::StoreError;
use crate::store::traits::{ReconcileReport, Storage};
use crate::types::{ChannelId, GuildId, KnownGuilds, QueueEntry, RoleId};

/// libSQL storage backend.
///
/// A single connection is reused for all operations; `libsql::Connection`
/// is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create store directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create tables if they do not exist. Idempotent.
    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS guild_config (
                    guild_id INTEGER PRIMARY KEY,
                    output_channel INTEGER,
                    notify_channel INTEGER,
                    muted_role INTEGER,
                    signoff TEXT,
                    counter INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS queue (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    guild_id INTEGER NOT NULL,
                    output_channel INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_queue_guild ON queue(guild_id);",
            )
            .await
            .map_err(|e| StoreError::Open(format!("Schema init failed: {e}")))?;
        Ok(())
    }
}

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

// Nullable column readers. NULL means unset; any other unexpected shape is
// corruption and must not be silently read back as unset.
fn opt_id_column(row: &libsql::Row, idx: i32, col: &str) -> Result<Option<i64>, StoreError> {
    match row.get_value(idx) {
        Ok(Value::Null) => Ok(None),
        Ok(Value::Integer(v)) => Ok(Some(v)),
        Ok(other) => Err(StoreError::Corrupt(format!(
            "{col} column: expected integer, got {other:?}"
        ))),
        Err(e) => Err(StoreError::Corrupt(format!("{col} column: {e}"))),
    }
}

fn opt_text_column(row: &libsql::Row, idx: i32, col: &str) -> Result<Option<String>, StoreError> {
    match row.get_value(idx) {
        Ok(Value::Null) => Ok(None),
        Ok(Value::Text(v)) => Ok(Some(v)),
        Ok(other) => Err(StoreError::Corrupt(format!(
            "{col} column: expected text, got {other:?}"
        ))),
        Err(e) => Err(StoreError::Corrupt(format!("{col} column: {e}"))),
    }
}

fn row_to_config(row: &libsql::Row) -> Result<GuildConfig, StoreError> {
    let output_channel = opt_id_column(row, 0, "output_channel")?;
    let notify_channel = opt_id_column(row, 1, "notify_channel")?;
    let muted_role = opt_id_column(row, 2, "muted_role")?;
    let signoff = opt_text_column(row, 3, "signoff")?;
    let counter: i64 = row
        .get(4)
        .map_err(|e| StoreError::Corrupt(format!("counter column: {e}")))?;

    Ok(GuildConfig {
        output_channel: output_channel.map(|v| ChannelId(v as u64)),
        notify_channel: notify_channel.map(|v| ChannelId(v as u64)),
        muted_role: muted_role.map(|v| RoleId(v as u64)),
        signoff,
        counter: counter as u64,
    })
}

#[async_trait]
impl Storage for LibSqlStore {
    async fn create_guild(&self, guild: GuildId) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO guild_config
                     (guild_id, counter, created_at, updated_at)
                 VALUES (?1, 1, ?2, ?2)",
                params![guild.0 as i64, now],
            )
            .await
            .map_err(query_err)?;
        debug!(guild = %guild, "Guild record ensured");
        Ok(())
    }

    async fn remove_guild(&self, guild: GuildId) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "DELETE FROM queue WHERE guild_id = ?1",
                params![guild.0 as i64],
            )
            .await
            .map_err(query_err)?;
        self.conn()
            .execute(
                "DELETE FROM guild_config WHERE guild_id = ?1",
                params![guild.0 as i64],
            )
            .await
            .map_err(query_err)?;
        info!(guild = %guild, "Guild record removed");
        Ok(())
    }

    async fn known_guilds(&self) -> Result<Vec<GuildId>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT guild_id FROM guild_config ORDER BY guild_id", ())
            .await
            .map_err(query_err)?;

        let mut guilds = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let id: i64 = row.get(0).map_err(query_err)?;
            guilds.push(GuildId(id as u64));
        }
        Ok(guilds)
    }

    async fn reconcile(&self, known: &KnownGuilds) -> Result<ReconcileReport, StoreError> {
        let persisted = self.known_guilds().await?;
        let mut report = ReconcileReport::default();

        for guild in &persisted {
            if !known.contains(guild) {
                self.remove_guild(*guild).await?;
                report.removed.push(*guild);
            }
        }
        for guild in known {
            if !persisted.contains(guild) {
                self.create_guild(*guild).await?;
                report.created.push(*guild);
            }
        }

        info!(
            created = report.created.len(),
            removed = report.removed.len(),
            "Store reconciled"
        );
        Ok(report)
    }

    async fn get_config(&self, guild: GuildId) -> Result<GuildConfig, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT output_channel, notify_channel, muted_role, signoff, counter
                 FROM guild_config WHERE guild_id = ?1",
                params![guild.0 as i64],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => row_to_config(&row),
            None => Err(StoreError::NotFound { guild }),
        }
    }

    async fn put_config(&self, guild: GuildId, config: &GuildConfig) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE guild_config SET
                     output_channel = ?2,
                     notify_channel = ?3,
                     muted_role = ?4,
                     signoff = ?5,
                     counter = ?6,
                     updated_at = ?7
                 WHERE guild_id = ?1",
                params![
                    guild.0 as i64,
                    config.output_channel.map(|c| c.0 as i64),
                    config.notify_channel.map(|c| c.0 as i64),
                    config.muted_role.map(|r| r.0 as i64),
                    config.signoff.clone(),
                    config.counter as i64,
                    now,
                ],
            )
            .await
            .map_err(query_err)?;

        if changed == 0 {
            return Err(StoreError::NotFound { guild });
        }
        debug!(guild = %guild, "Config updated");
        Ok(())
    }

    async fn next_sequence(&self, guild: GuildId) -> Result<u64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn()
            .query(
                "UPDATE guild_config SET counter = counter + 1, updated_at = ?2
                 WHERE guild_id = ?1
                 RETURNING counter - 1",
                params![guild.0 as i64, now],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let previous: i64 = row.get(0).map_err(query_err)?;
                Ok(previous as u64)
            }
            None => Err(StoreError::NotFound { guild }),
        }
    }

    async fn reset_counter(&self, guild: GuildId) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE guild_config SET counter = 1, updated_at = ?2 WHERE guild_id = ?1",
                params![guild.0 as i64, now],
            )
            .await
            .map_err(query_err)?;

        if changed == 0 {
            return Err(StoreError::NotFound { guild });
        }
        info!(guild = %guild, "Counter reset");
        Ok(())
    }

    async fn enqueue(&self, guild: GuildId, entry: &QueueEntry) -> Result<usize, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO queue (guild_id, output_channel, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    guild.0 as i64,
                    entry.output_channel.0 as i64,
                    entry.content.clone(),
                    now,
                ],
            )
            .await
            .map_err(query_err)?;

        let depth = self.queue_depth(guild).await?;
        debug!(guild = %guild, depth, "Entry enqueued");
        Ok(depth)
    }

    async fn snapshot(&self, guild: GuildId) -> Result<Vec<QueueEntry>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, output_channel, content FROM queue
                 WHERE guild_id = ?1 ORDER BY id",
                params![guild.0 as i64],
            )
            .await
            .map_err(query_err)?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let id: i64 = row.get(0).map_err(query_err)?;
            let output_channel: i64 = row.get(1).map_err(query_err)?;
            let content: String = row.get(2).map_err(query_err)?;
            entries.push(QueueEntry {
                id: Some(id),
                output_channel: ChannelId(output_channel as u64),
                content,
            });
        }
        Ok(entries)
    }

    async fn pop_front(&self, guild: GuildId, expected_head: i64) -> Result<(), StoreError> {
        // Single statement: the delete only lands if the expected entry is
        // still the queue head for this guild.
        let changed = self
            .conn()
            .execute(
                "DELETE FROM queue
                 WHERE id = ?2
                   AND id = (SELECT MIN(id) FROM queue WHERE guild_id = ?1)",
                params![guild.0 as i64, expected_head],
            )
            .await
            .map_err(query_err)?;

        if changed == 0 {
            return Err(StoreError::Conflict);
        }
        debug!(guild = %guild, entry = expected_head, "Queue head popped");
        Ok(())
    }

    async fn queue_depth(&self, guild: GuildId) -> Result<usize, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM queue WHERE guild_id = ?1",
                params![guild.0 as i64],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err)?;
                Ok(count as usize)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn create_and_get_defaults() {
        let store = memory_store().await;
        let guild = GuildId(1);

        store.create_guild(guild).await.unwrap();
        let config = store.get_config(guild).await.unwrap();
        assert_eq!(config, GuildConfig::default());
        assert_eq!(config.counter, 1);
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = memory_store().await;
        let guild = GuildId(1);

        store.create_guild(guild).await.unwrap();
        let mut config = store.get_config(guild).await.unwrap();
        config.counter = 7;
        store.put_config(guild, &config).await.unwrap();

        // A second create must not clobber the existing record.
        store.create_guild(guild).await.unwrap();
        assert_eq!(store.get_config(guild).await.unwrap().counter, 7);
    }

    #[tokio::test]
    async fn get_unknown_guild_is_not_found() {
        let store = memory_store().await;
        let err = store.get_config(GuildId(99)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { guild } if guild == GuildId(99)));
    }

    #[tokio::test]
    async fn put_config_roundtrip() {
        let store = memory_store().await;
        let guild = GuildId(2);
        store.create_guild(guild).await.unwrap();

        let config = GuildConfig {
            output_channel: Some(ChannelId(10)),
            notify_channel: Some(ChannelId(11)),
            muted_role: Some(RoleId(12)),
            signoff: Some("- The Collective".into()),
            counter: 42,
        };
        store.put_config(guild, &config).await.unwrap();
        assert_eq!(store.get_config(guild).await.unwrap(), config);
    }

    #[tokio::test]
    async fn corrupt_config_column_is_reported_not_masked() {
        let store = memory_store().await;
        let guild = GuildId(2);
        store.create_guild(guild).await.unwrap();

        // SQLite's INTEGER affinity still stores non-numeric text as text.
        store
            .conn()
            .execute(
                "UPDATE guild_config SET output_channel = 'bogus' WHERE guild_id = ?1",
                params![guild.0 as i64],
            )
            .await
            .unwrap();

        let err = store.get_config(guild).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("output_channel")));
    }

    #[tokio::test]
    async fn put_config_unknown_guild_is_not_found() {
        let store = memory_store().await;
        let err = store
            .put_config(GuildId(3), &GuildConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn next_sequence_returns_pre_increment() {
        let store = memory_store().await;
        let guild = GuildId(4);
        store.create_guild(guild).await.unwrap();

        assert_eq!(store.next_sequence(guild).await.unwrap(), 1);
        assert_eq!(store.next_sequence(guild).await.unwrap(), 2);
        assert_eq!(store.next_sequence(guild).await.unwrap(), 3);
        assert_eq!(store.get_config(guild).await.unwrap().counter, 4);
    }

    #[tokio::test]
    async fn reset_counter_goes_back_to_one() {
        let store = memory_store().await;
        let guild = GuildId(5);
        store.create_guild(guild).await.unwrap();

        for _ in 0..5 {
            store.next_sequence(guild).await.unwrap();
        }
        store.reset_counter(guild).await.unwrap();
        assert_eq!(store.get_config(guild).await.unwrap().counter, 1);
    }

    #[tokio::test]
    async fn enqueue_reports_depth_and_preserves_order() {
        let store = memory_store().await;
        let guild = GuildId(6);
        store.create_guild(guild).await.unwrap();

        let first = QueueEntry::new(ChannelId(100), "hello");
        let second = QueueEntry::new(ChannelId(100), "world");
        assert_eq!(store.enqueue(guild, &first).await.unwrap(), 1);
        assert_eq!(store.enqueue(guild, &second).await.unwrap(), 2);

        let snapshot = store.snapshot(guild).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].content, "hello");
        assert_eq!(snapshot[1].content, "world");
        assert!(snapshot[0].id.unwrap() < snapshot[1].id.unwrap());
    }

    #[tokio::test]
    async fn pop_front_removes_exactly_the_head() {
        let store = memory_store().await;
        let guild = GuildId(7);
        store.create_guild(guild).await.unwrap();

        store
            .enqueue(guild, &QueueEntry::new(ChannelId(1), "a"))
            .await
            .unwrap();
        store
            .enqueue(guild, &QueueEntry::new(ChannelId(1), "b"))
            .await
            .unwrap();

        let head = store.snapshot(guild).await.unwrap()[0].id.unwrap();
        store.pop_front(guild, head).await.unwrap();

        let snapshot = store.snapshot(guild).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "b");
    }

    #[tokio::test]
    async fn pop_front_with_stale_head_conflicts() {
        let store = memory_store().await;
        let guild = GuildId(8);
        store.create_guild(guild).await.unwrap();

        store
            .enqueue(guild, &QueueEntry::new(ChannelId(1), "a"))
            .await
            .unwrap();
        store
            .enqueue(guild, &QueueEntry::new(ChannelId(1), "b"))
            .await
            .unwrap();

        let snapshot = store.snapshot(guild).await.unwrap();
        let second = snapshot[1].id.unwrap();

        // Trying to pop the second entry while the first is still queued.
        let err = store.pop_front(guild, second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.queue_depth(guild).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn queues_are_isolated_per_guild() {
        let store = memory_store().await;
        store.create_guild(GuildId(10)).await.unwrap();
        store.create_guild(GuildId(11)).await.unwrap();

        store
            .enqueue(GuildId(10), &QueueEntry::new(ChannelId(1), "only mine"))
            .await
            .unwrap();

        assert_eq!(store.queue_depth(GuildId(10)).await.unwrap(), 1);
        assert_eq!(store.queue_depth(GuildId(11)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_guild_drops_config_and_queue() {
        let store = memory_store().await;
        let guild = GuildId(12);
        store.create_guild(guild).await.unwrap();
        store
            .enqueue(guild, &QueueEntry::new(ChannelId(1), "x"))
            .await
            .unwrap();

        store.remove_guild(guild).await.unwrap();
        assert!(matches!(
            store.get_config(guild).await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.queue_depth(guild).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reconcile_creates_and_removes() {
        let store = memory_store().await;
        let (a, b, c) = (GuildId(20), GuildId(21), GuildId(22));

        store.create_guild(a).await.unwrap();
        store.create_guild(b).await.unwrap();
        store
            .enqueue(b, &QueueEntry::new(ChannelId(1), "stale"))
            .await
            .unwrap();

        let known: KnownGuilds = [a, c].into_iter().collect();
        let report = store.reconcile(&known).await.unwrap();

        assert_eq!(report.created, vec![c]);
        assert_eq!(report.removed, vec![b]);
        assert_eq!(store.known_guilds().await.unwrap(), vec![a, c]);
        assert_eq!(store.queue_depth(b).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("relay.db");
        let guild = GuildId(30);

        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.create_guild(guild).await.unwrap();
            store
                .enqueue(guild, &QueueEntry::new(ChannelId(5), "durable"))
                .await
                .unwrap();
            store.next_sequence(guild).await.unwrap();
        }

        let store = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(store.queue_depth(guild).await.unwrap(), 1);
        assert_eq!(store.get_config(guild).await.unwrap().counter, 2);
    }
}
