use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StoreError;

// ============================================================================
// Store
// ============================================================================

/// Handle to the durable store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    /// Open the store and run migrations.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        // busy_timeout=5000: wait up to 5 seconds for locks before failing,
        // which absorbs transient contention between a poll cycle and a
        // concurrently handled command.
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        // Each connection to an in-memory database is a distinct database,
        // so the pool must hold exactly one connection and never recycle it.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store
            .migrate()
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(store)
    }

    /// Startup gate: retry [`Store::open`] with a fixed delay between
    /// attempts. The store may still be coming up when the process starts,
    /// so the caller uses many attempts with a short delay.
    pub async fn open_with_retry(
        url: &str,
        max_attempts: u32,
        delay: Duration,
    ) -> Result<Self, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::open(url).await {
                Ok(store) => {
                    tracing::info!(attempt, "Database connection established");
                    return Ok(store);
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Database connection attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run migrations atomically within a transaction. All statements use
    /// `IF NOT EXISTS`, so re-running on an existing database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                server_id TEXT NOT NULL,
                feed_type TEXT NOT NULL,
                last_checked_at INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE(url, channel_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_items (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                item_id TEXT NOT NULL,
                title TEXT,
                link TEXT,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE(feed_id, item_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_channel ON feeds(channel_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_server ON feeds(server_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_last_checked ON feeds(last_checked_at)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feed_items_feed ON feed_items(feed_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feed_items_published ON feed_items(published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feed_items_created ON feed_items(created_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
