use serde::Deserialize;
use thiserror::Error;

use crate::storage::{FeedType, NormalizedItem};

/// Malformed feed payload; the caller logs it and aborts that feed's check
/// for the cycle without touching other feeds.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML feed: {0}")]
    Xml(String),
    #[error("Malformed JSON feed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Normalize a fetched feed body into items, choosing the adapter by the
/// registration's feed type. Order is preserved as delivered by the source.
pub fn parse_feed(feed_type: FeedType, bytes: &[u8]) -> Result<Vec<NormalizedItem>, ParseError> {
    match feed_type {
        FeedType::Json => parse_json(bytes),
        FeedType::Rss | FeedType::Atom => parse_xml(bytes),
    }
}

// ============================================================================
// XML Adapter (RSS / Atom)
// ============================================================================

/// Parse RSS/Atom via feed-rs. Identifier fallback: guid, then link, then
/// title; description: summary, then content body; published: published,
/// then updated, then now.
pub fn parse_xml(bytes: &[u8]) -> Result<Vec<NormalizedItem>, ParseError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| ParseError::Xml(e.to_string()))?;
    let now = chrono::Utc::now().timestamp();

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let link = entry.links.first().map(|l| l.href.clone());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp())
                .unwrap_or(now);

            let id = if entry.id.trim().is_empty() {
                link.clone().unwrap_or_else(|| title.clone())
            } else {
                entry.id
            };

            NormalizedItem {
                id,
                title,
                link,
                description,
                published,
            }
        })
        .collect();

    Ok(items)
}

// ============================================================================
// JSON Adapter (JSON Feed)
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonFeedDocument {
    #[serde(default)]
    items: Vec<JsonFeedItem>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonFeedItem {
    // Ids are strings per the JSON Feed spec, but numbers occur in the wild
    id: Option<serde_json::Value>,
    url: Option<String>,
    external_url: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    content_text: Option<String>,
    date_published: Option<String>,
    date_modified: Option<String>,
}

/// Parse a JSON Feed document. Identifier fallback: id, then url, then
/// title; link: url, then external_url; description: summary, then
/// content_text; published: date_published, then date_modified, then now.
pub fn parse_json(bytes: &[u8]) -> Result<Vec<NormalizedItem>, ParseError> {
    let document: JsonFeedDocument = serde_json::from_slice(bytes)?;
    let now = chrono::Utc::now().timestamp();

    let items = document
        .items
        .into_iter()
        .map(|item| {
            let title = item.title.unwrap_or_default();
            let link = item.url.clone().or(item.external_url);
            let id = item
                .id
                .and_then(stringify_id)
                .or(item.url)
                .unwrap_or_else(|| title.clone());
            let description = item.summary.or(item.content_text);
            let published = parse_timestamp(item.date_published.as_deref())
                .or_else(|| parse_timestamp(item.date_modified.as_deref()))
                .unwrap_or(now);

            NormalizedItem {
                id,
                title,
                link,
                description,
                published,
            }
        })
        .collect();

    Ok(items)
}

fn stringify_id(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value?)
        .ok()
        .map(|dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS_BODY: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <item>
    <guid>post-1</guid>
    <title>First post</title>
    <link>https://example.com/1</link>
    <description>Hello world</description>
    <pubDate>Wed, 01 Jan 2020 00:00:00 GMT</pubDate>
  </item>
  <item>
    <title>No guid here</title>
    <link>https://example.com/2</link>
  </item>
</channel></rss>"#;

    const ATOM_BODY: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example</title>
  <entry>
    <id>urn:entry:1</id>
    <title>Atom entry</title>
    <link href="https://example.com/atom/1"/>
    <summary>Summary text</summary>
    <updated>2020-06-01T12:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_map_guid_link_and_description() {
        let items = parse_xml(RSS_BODY.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "post-1");
        assert_eq!(items[0].title, "First post");
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/1"));
        assert_eq!(items[0].description.as_deref(), Some("Hello world"));
        assert_eq!(items[0].published, 1577836800);
    }

    #[test]
    fn atom_entry_uses_updated_when_published_missing() {
        let items = parse_xml(ATOM_BODY.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "urn:entry:1");
        assert_eq!(items[0].description.as_deref(), Some("Summary text"));
        assert_eq!(items[0].published, 1591012800);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_xml(b"<not a feed").is_err());
    }

    #[test]
    fn json_feed_maps_all_fallback_chains() {
        let body = r#"{
            "version": "https://jsonfeed.org/version/1.1",
            "title": "Example",
            "items": [
                {
                    "id": "j1",
                    "url": "https://example.com/j1",
                    "title": "Json item",
                    "summary": "Short summary",
                    "date_published": "2021-03-01T00:00:00Z"
                },
                {
                    "title": "Only external",
                    "external_url": "https://elsewhere.example/post",
                    "content_text": "Body text",
                    "date_modified": "2021-04-01T00:00:00Z"
                }
            ]
        }"#;

        let items = parse_json(body.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "j1");
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/j1"));
        assert_eq!(items[0].description.as_deref(), Some("Short summary"));
        assert_eq!(items[0].published, 1614556800);

        // No id and no url: falls back to title / external_url / content_text
        assert_eq!(items[1].id, "Only external");
        assert_eq!(
            items[1].link.as_deref(),
            Some("https://elsewhere.example/post")
        );
        assert_eq!(items[1].description.as_deref(), Some("Body text"));
        assert_eq!(items[1].published, 1617235200);
    }

    #[test]
    fn json_numeric_id_is_stringified() {
        let body = r#"{"version":"https://jsonfeed.org/version/1","items":[{"id":42,"title":"n"}]}"#;
        let items = parse_json(body.as_bytes()).unwrap();
        assert_eq!(items[0].id, "42");
    }

    #[test]
    fn json_missing_items_field_yields_empty() {
        let body = r#"{"version":"https://jsonfeed.org/version/1","title":"Empty"}"#;
        assert!(parse_json(body.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_json(b"{not json").is_err());
    }

    #[test]
    fn dispatcher_routes_by_feed_type() {
        assert_eq!(parse_feed(FeedType::Rss, RSS_BODY.as_bytes()).unwrap().len(), 2);
        assert_eq!(parse_feed(FeedType::Atom, ATOM_BODY.as_bytes()).unwrap().len(), 1);
        let json = r#"{"version":"https://jsonfeed.org/version/1","items":[]}"#;
        assert!(parse_feed(FeedType::Json, json.as_bytes()).unwrap().is_empty());
    }
}
