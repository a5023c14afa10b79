use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors. Connectivity loss and constraint failures both
/// surface here; callers in the poll path log and move on to the next feed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(String),
}

// ============================================================================
// Feed Types
// ============================================================================

/// Syndication format of a registered feed, decided once at registration
/// time by the type detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum FeedType {
    Rss,
    Atom,
    Json,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Rss => "rss",
            FeedType::Atom => "atom",
            FeedType::Json => "json",
        }
    }

    /// Uppercase tag used in user-facing replies, e.g. `[RSS]`.
    pub fn tag(&self) -> &'static str {
        match self {
            FeedType::Rss => "RSS",
            FeedType::Atom => "ATOM",
            FeedType::Json => "JSON",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rss" => Ok(FeedType::Rss),
            "atom" => Ok(FeedType::Atom),
            "json" => Ok(FeedType::Json),
            other => Err(format!("unknown feed type: {other}")),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One subscription binding a feed URL to a destination channel.
///
/// At most one registration exists per `(url, channel_id)` pair; the store
/// enforces this with a unique constraint.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedRegistration {
    pub id: i64,
    pub url: String,
    pub channel_id: String,
    pub server_id: String,
    pub feed_type: FeedType,
    /// Unix seconds of the last completed check; `None` until the first one.
    pub last_checked_at: Option<i64>,
    pub created_at: i64,
}

impl FeedRegistration {
    /// Mirror key for the in-memory registration map.
    pub fn key(&self) -> (String, String) {
        (self.url.clone(), self.channel_id.clone())
    }
}

/// Parser output common to all feed formats. Transient: only the fields
/// needed for the dedup record and message rendering are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    /// Feed-provided identifier (guid/id, falling back to link, then title).
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    /// Unix seconds; best-effort from feed metadata, else time of ingestion.
    pub published: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_type_round_trips_through_str() {
        for feed_type in [FeedType::Rss, FeedType::Atom, FeedType::Json] {
            assert_eq!(feed_type.as_str().parse::<FeedType>().unwrap(), feed_type);
        }
    }

    #[test]
    fn feed_type_rejects_unknown() {
        assert!("html".parse::<FeedType>().is_err());
    }
}
