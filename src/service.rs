use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::bot::render::render_item;
use crate::bot::transport::ChatTransport;
use crate::feed::fetcher::{self, FetchError, FEED_TIMEOUT};
use crate::feed::parser::{self, ParseError};
use crate::storage::{FeedRegistration, FeedType, NormalizedItem, Store, StoreError};

/// Per-feed cap on items processed in one cycle. Bounds the delivery burst
/// after an outage: at most this many backlog items are posted, not an
/// unbounded flood.
pub const MAX_ITEMS_PER_CHECK: usize = 5;

/// Failure of one feed's check. Scoped to that feed and that cycle; callers
/// log it and continue with the remaining feeds.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of an idempotent `add`.
#[derive(Debug)]
pub enum AddOutcome {
    Added(FeedRegistration),
    AlreadyRegistered,
}

/// Owns the durable store handle, the HTTP client, and the in-memory
/// registration mirror. Constructed at startup; the mirror is hydrated from
/// the store and kept in sync on add/remove.
///
/// Clones share all state, so the poller and the command handlers operate
/// on the same service. Handlers are reentrant: a manual check and a
/// scheduled cycle may race on the same feed, and the store's conditional
/// insert decides which caller delivers.
#[derive(Clone)]
pub struct IngestionService {
    store: Store,
    client: reqwest::Client,
    transport: Arc<dyn ChatTransport>,
    registrations: Arc<RwLock<HashMap<(String, String), FeedRegistration>>>,
}

impl IngestionService {
    pub fn new(store: Store, client: reqwest::Client, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            store,
            client,
            transport,
            registrations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Rebuild the registration mirror from the store. Returns the number of
    /// registrations loaded.
    pub async fn hydrate(&self) -> Result<usize, StoreError> {
        let all = self.store.all_registrations().await?;
        let count = all.len();
        let mut mirror = self.registrations.write().await;
        mirror.clear();
        for registration in all {
            mirror.insert(registration.key(), registration);
        }
        Ok(count)
    }

    /// Register a feed for a channel. Idempotent: re-adding an existing
    /// `(url, channel)` pair reports [`AddOutcome::AlreadyRegistered`].
    pub async fn add_feed(
        &self,
        url: &str,
        channel_id: &str,
        server_id: &str,
        feed_type: FeedType,
    ) -> Result<AddOutcome, StoreError> {
        let outcome = self
            .store
            .upsert_registration(url, channel_id, server_id, feed_type)
            .await?;

        if !outcome.inserted {
            return Ok(AddOutcome::AlreadyRegistered);
        }

        let Some(registration) = self.store.find_registration(url, channel_id).await? else {
            // Removed between insert and read-back; treat as a lost race
            return Ok(AddOutcome::AlreadyRegistered);
        };

        self.registrations
            .write()
            .await
            .insert(registration.key(), registration.clone());

        Ok(AddOutcome::Added(registration))
    }

    /// Unregister a feed. Returns true iff the registration existed.
    pub async fn remove_feed(&self, url: &str, channel_id: &str) -> Result<bool, StoreError> {
        let removed = self.store.remove_registration(url, channel_id).await?;
        if removed {
            self.registrations
                .write()
                .await
                .remove(&(url.to_string(), channel_id.to_string()));
        }
        Ok(removed)
    }

    pub async fn list_feeds(&self, channel_id: &str) -> Result<Vec<FeedRegistration>, StoreError> {
        self.store.list_registrations(channel_id).await
    }

    /// Fast mirror lookup used by the manual `check` command.
    pub async fn find_feed(&self, url: &str, channel_id: &str) -> Option<FeedRegistration> {
        self.registrations
            .read()
            .await
            .get(&(url.to_string(), channel_id.to_string()))
            .cloned()
    }

    /// Snapshot of every registration for a poll cycle.
    pub async fn all_feeds(&self) -> Result<Vec<FeedRegistration>, StoreError> {
        self.store.all_registrations().await
    }

    /// Check one feed: fetch, normalize, record novel items, and deliver
    /// them to the feed's channel. Returns the number of new items recorded.
    ///
    /// The dedup record is inserted before delivery is attempted, so a
    /// delivery failure drops that item rather than reposting it next cycle.
    pub async fn check_feed(&self, registration: &FeedRegistration) -> Result<usize, CheckError> {
        self.process_feed(registration, true).await
    }

    /// Initialise pass after `add`: record the feed's current items as seen
    /// without delivering any of them, so only items published after
    /// registration ever reach the channel.
    pub async fn initialise_feed(
        &self,
        registration: &FeedRegistration,
    ) -> Result<usize, CheckError> {
        self.process_feed(registration, false).await
    }

    async fn process_feed(
        &self,
        registration: &FeedRegistration,
        deliver: bool,
    ) -> Result<usize, CheckError> {
        let items = self.fetch_items(registration).await?;
        let mut new_items = 0;

        for item in items.iter().take(MAX_ITEMS_PER_CHECK) {
            if self.store.record_item_if_new(registration.id, item).await? {
                new_items += 1;
                if deliver {
                    self.deliver_item(registration, item).await;
                }
            }
        }

        self.store.touch_last_checked(registration.id).await?;

        if new_items > 0 && deliver {
            tracing::info!(
                url = %registration.url,
                channel = %registration.channel_id,
                new_items,
                "Posted new feed items"
            );
        }
        Ok(new_items)
    }

    async fn fetch_items(
        &self,
        registration: &FeedRegistration,
    ) -> Result<Vec<NormalizedItem>, CheckError> {
        let body = fetcher::fetch_body(&self.client, &registration.url, FEED_TIMEOUT).await?;
        let items = parser::parse_feed(registration.feed_type, &body.bytes)?;
        Ok(items)
    }

    async fn deliver_item(&self, registration: &FeedRegistration, item: &NormalizedItem) {
        let message = render_item(item);
        if let Err(e) = self
            .transport
            .send_to_channel(&registration.channel_id, &message)
            .await
        {
            tracing::warn!(
                channel = %registration.channel_id,
                url = %registration.url,
                error = %e,
                "Failed to deliver feed item"
            );
        }
    }
}
