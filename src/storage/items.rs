use super::db::Store;
use super::types::{NormalizedItem, StoreError};

impl Store {
    // ========================================================================
    // Item Record Operations
    // ========================================================================

    /// Conditionally insert the dedup record for one observed item. Returns
    /// true iff the item was genuinely new, false if it was already seen.
    ///
    /// This is the single deduplication primitive. Atomicity comes from the
    /// `UNIQUE(feed_id, item_id)` constraint: of several concurrent insert
    /// attempts for the same pair, exactly one reports true, and only that
    /// caller delivers.
    pub async fn record_item_if_new(
        &self,
        feed_id: i64,
        item: &NormalizedItem,
    ) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO feed_items (feed_id, item_id, title, link, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, item_id) DO NOTHING
        "#,
        )
        .bind(feed_id)
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.link)
        .bind(item.published)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the registration's last-checked timestamp to now.
    pub async fn touch_last_checked(&self, feed_id: i64) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE feeds SET last_checked_at = ? WHERE id = ?")
            .bind(now)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Number of item records held for a feed.
    pub async fn item_count(&self, feed_id: i64) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feed_items WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FeedType;

    fn item(id: &str) -> NormalizedItem {
        NormalizedItem {
            id: id.to_string(),
            title: format!("Item {id}"),
            link: Some(format!("https://example.com/{id}")),
            description: Some("A test entry".to_string()),
            published: 1_700_000_000,
        }
    }

    async fn store_with_feed() -> (Store, i64) {
        let store = Store::open("sqlite::memory:").await.unwrap();
        let outcome = store
            .upsert_registration("https://example.com/feed.xml", "chan1", "srv1", FeedType::Rss)
            .await
            .unwrap();
        (store, outcome.id)
    }

    #[tokio::test]
    async fn first_insert_is_new_second_is_seen() {
        let (store, feed_id) = store_with_feed().await;

        assert!(store.record_item_if_new(feed_id, &item("a")).await.unwrap());
        assert!(!store.record_item_if_new(feed_id, &item("a")).await.unwrap());
        assert_eq!(store.item_count(feed_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_item_id_on_other_feed_is_new() {
        let (store, feed_id) = store_with_feed().await;
        let other = store
            .upsert_registration("https://other.example/feed", "chan1", "srv1", FeedType::Atom)
            .await
            .unwrap();

        assert!(store.record_item_if_new(feed_id, &item("a")).await.unwrap());
        assert!(store.record_item_if_new(other.id, &item("a")).await.unwrap());
    }

    #[tokio::test]
    async fn removing_feed_cascades_to_items() {
        let (store, feed_id) = store_with_feed().await;

        store.record_item_if_new(feed_id, &item("a")).await.unwrap();
        store.record_item_if_new(feed_id, &item("b")).await.unwrap();
        assert_eq!(store.item_count(feed_id).await.unwrap(), 2);

        store
            .remove_registration("https://example.com/feed.xml", "chan1")
            .await
            .unwrap();
        assert_eq!(store.item_count(feed_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn touch_sets_last_checked() {
        let (store, feed_id) = store_with_feed().await;

        let before = store
            .find_registration("https://example.com/feed.xml", "chan1")
            .await
            .unwrap()
            .unwrap();
        assert!(before.last_checked_at.is_none());

        store.touch_last_checked(feed_id).await.unwrap();

        let after = store
            .find_registration("https://example.com/feed.xml", "chan1")
            .await
            .unwrap()
            .unwrap();
        assert!(after.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn concurrent_inserts_elect_one_winner() {
        let (store, feed_id) = store_with_feed().await;
        let entry = item("contested");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let entry = entry.clone();
            handles.push(tokio::spawn(async move {
                store.record_item_if_new(feed_id, &entry).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.item_count(feed_id).await.unwrap(), 1);
    }
}
