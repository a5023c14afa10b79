use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::service::IngestionService;

/// Drives the repeating poll over all registered feeds.
///
/// Feeds are checked sequentially with a fixed pacing delay between them to
/// bound the outbound request rate. Any single feed's failure is logged and
/// contained; it aborts neither the rest of the cycle nor future cycles.
pub struct Poller {
    service: IngestionService,
    interval: Duration,
    pacing: Duration,
}

impl Poller {
    pub fn new(service: IngestionService, interval: Duration, pacing: Duration) -> Self {
        Self {
            service,
            interval,
            pacing,
        }
    }

    /// Run cycles forever on the configured cadence. The first cycle fires
    /// one full interval after startup, not immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consume the immediate first tick

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One full pass over the registration snapshot.
    pub async fn run_cycle(&self) {
        let feeds = match self.service.all_feeds().await {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate feeds, skipping cycle");
                return;
            }
        };

        tracing::info!(feeds = feeds.len(), "Checking feeds");

        for (index, feed) in feeds.iter().enumerate() {
            if let Err(e) = self.service.check_feed(feed).await {
                tracing::warn!(url = %feed.url, error = %e, "Feed check failed");
            }

            // Pace between feeds, not after the last one
            if index + 1 < feeds.len() {
                tokio::time::sleep(self.pacing).await;
            }
        }
    }
}
