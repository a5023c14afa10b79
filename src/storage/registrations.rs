use super::db::Store;
use super::types::{FeedRegistration, FeedType, StoreError};

/// Result of an idempotent registration insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Row id of the registration, whether it was just created or already
    /// existed.
    pub id: i64,
    /// True iff a new row was inserted.
    pub inserted: bool,
}

impl Store {
    // ========================================================================
    // Registration Operations
    // ========================================================================

    /// Insert a registration for `(url, channel_id)`. Adding a feed that is
    /// already registered for the channel is a no-op, not an update.
    pub async fn upsert_registration(
        &self,
        url: &str,
        channel_id: &str,
        server_id: &str,
        feed_type: FeedType,
    ) -> Result<UpsertOutcome, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, channel_id, server_id, feed_type, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url, channel_id) DO NOTHING
            RETURNING id
        "#,
        )
        .bind(url)
        .bind(channel_id)
        .bind(server_id)
        .bind(feed_type)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id,)) = inserted {
            return Ok(UpsertOutcome { id, inserted: true });
        }

        // Conflict path: the registration already exists, fetch its id
        let (id,): (i64,) =
            sqlx::query_as("SELECT id FROM feeds WHERE url = ? AND channel_id = ?")
                .bind(url)
                .bind(channel_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(UpsertOutcome {
            id,
            inserted: false,
        })
    }

    /// Delete the registration for `(url, channel_id)`, cascading to its item
    /// records. Returns true iff a row was actually removed.
    pub async fn remove_registration(
        &self,
        url: &str,
        channel_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM feeds WHERE url = ? AND channel_id = ?")
            .bind(url)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All registrations for one channel, in insertion order.
    pub async fn list_registrations(
        &self,
        channel_id: &str,
    ) -> Result<Vec<FeedRegistration>, StoreError> {
        let registrations = sqlx::query_as::<_, FeedRegistration>(
            r#"
            SELECT id, url, channel_id, server_id, feed_type, last_checked_at, created_at
            FROM feeds
            WHERE channel_id = ?
            ORDER BY id
        "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(registrations)
    }

    /// Every registration, in insertion order. Used for mirror hydration at
    /// startup and as the snapshot for a poll cycle.
    pub async fn all_registrations(&self) -> Result<Vec<FeedRegistration>, StoreError> {
        let registrations = sqlx::query_as::<_, FeedRegistration>(
            r#"
            SELECT id, url, channel_id, server_id, feed_type, last_checked_at, created_at
            FROM feeds
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(registrations)
    }

    /// Look up one registration by its unique key.
    pub async fn find_registration(
        &self,
        url: &str,
        channel_id: &str,
    ) -> Result<Option<FeedRegistration>, StoreError> {
        let registration = sqlx::query_as::<_, FeedRegistration>(
            r#"
            SELECT id, url, channel_id, server_id, feed_type, last_checked_at, created_at
            FROM feeds
            WHERE url = ? AND channel_id = ?
        "#,
        )
        .bind(url)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        Store::open("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_url_channel() {
        let store = test_store().await;

        let first = store
            .upsert_registration("https://example.com/feed.xml", "chan1", "srv1", FeedType::Rss)
            .await
            .unwrap();
        assert!(first.inserted);

        let second = store
            .upsert_registration("https://example.com/feed.xml", "chan1", "srv1", FeedType::Rss)
            .await
            .unwrap();
        assert!(!second.inserted);
        assert_eq!(first.id, second.id);

        let registrations = store.list_registrations("chan1").await.unwrap();
        assert_eq!(registrations.len(), 1);
    }

    #[tokio::test]
    async fn same_url_different_channel_is_distinct() {
        let store = test_store().await;

        let a = store
            .upsert_registration("https://example.com/feed.xml", "chan1", "srv1", FeedType::Rss)
            .await
            .unwrap();
        let b = store
            .upsert_registration("https://example.com/feed.xml", "chan2", "srv1", FeedType::Rss)
            .await
            .unwrap();

        assert!(a.inserted);
        assert!(b.inserted);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn remove_reports_whether_a_row_existed() {
        let store = test_store().await;

        store
            .upsert_registration("https://example.com/feed.xml", "chan1", "srv1", FeedType::Atom)
            .await
            .unwrap();

        assert!(store
            .remove_registration("https://example.com/feed.xml", "chan1")
            .await
            .unwrap());
        assert!(!store
            .remove_registration("https://example.com/feed.xml", "chan1")
            .await
            .unwrap());
        assert!(!store
            .remove_registration("https://other.example/feed", "chan1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn list_preserves_insertion_order() {
        let store = test_store().await;

        for url in ["https://a.example/f", "https://b.example/f", "https://c.example/f"] {
            store
                .upsert_registration(url, "chan1", "srv1", FeedType::Json)
                .await
                .unwrap();
        }

        let registrations = store.list_registrations("chan1").await.unwrap();
        let urls: Vec<&str> = registrations.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/f", "https://b.example/f", "https://c.example/f"]
        );
        assert!(registrations.iter().all(|r| r.last_checked_at.is_none()));
    }

    #[tokio::test]
    async fn find_registration_matches_exact_key() {
        let store = test_store().await;

        store
            .upsert_registration("https://example.com/feed.xml", "chan1", "srv1", FeedType::Rss)
            .await
            .unwrap();

        let found = store
            .find_registration("https://example.com/feed.xml", "chan1")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().feed_type, FeedType::Rss);

        let missing = store
            .find_registration("https://example.com/feed.xml", "chan2")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
