use crate::feed::fetcher::{self, DETECT_TIMEOUT};
use crate::storage::FeedType;

/// Version URI scheme that identifies a JSON Feed document.
const JSON_FEED_VERSION_PREFIX: &str = "https://jsonfeed.org/version/";

/// Fetch a candidate URL once and classify it as RSS, Atom, or JSON Feed.
///
/// Returns `None` (undetected) on non-success status, network error, or
/// content matching none of the recognized shapes. This is a one-shot
/// heuristic and never raises to the caller.
pub async fn detect(client: &reqwest::Client, url: &str) -> Option<FeedType> {
    match fetcher::fetch_body(client, url, DETECT_TIMEOUT).await {
        Ok(body) => {
            let text = String::from_utf8_lossy(&body.bytes);
            classify(body.content_type.as_deref(), &text)
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Feed type detection fetch failed");
            None
        }
    }
}

/// Pure classification over (declared content type, raw body).
///
/// Detection order: JSON Feed first (declared JSON content type, or a body
/// whose leading non-whitespace character is `{`), then an `<rss` opening
/// tag, then `<feed` combined with the Atom namespace declaration.
pub fn classify(content_type: Option<&str>, body: &str) -> Option<FeedType> {
    let looks_like_json = content_type
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false)
        || body.trim_start().starts_with('{');

    if looks_like_json {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            let is_json_feed = value
                .get("version")
                .and_then(|v| v.as_str())
                .map(|v| v.starts_with(JSON_FEED_VERSION_PREFIX))
                .unwrap_or(false);
            if is_json_feed {
                return Some(FeedType::Json);
            }
        }
    }

    if body.contains("<rss") {
        return Some(FeedType::Rss);
    }
    if body.contains("<feed") && body.contains(r#"xmlns="http://www.w3.org/2005/Atom""#) {
        return Some(FeedType::Atom);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn json_feed_body_classifies_as_json() {
        let body = r#"{"version":"https://jsonfeed.org/version/1.1","title":"T","items":[]}"#;
        assert_eq!(classify(None, body), Some(FeedType::Json));
        assert_eq!(
            classify(Some("application/json"), body),
            Some(FeedType::Json)
        );
    }

    #[test]
    fn json_without_feed_version_is_undetected() {
        assert_eq!(classify(None, r#"{"version":"2.0"}"#), None);
        assert_eq!(classify(Some("application/json"), r#"{"items":[]}"#), None);
    }

    #[test]
    fn rss_body_classifies_as_rss() {
        let body = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        assert_eq!(classify(Some("application/xml"), body), Some(FeedType::Rss));
    }

    #[test]
    fn atom_body_classifies_as_atom() {
        let body = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"></feed>"#;
        assert_eq!(classify(None, body), Some(FeedType::Atom));
    }

    #[test]
    fn feed_tag_without_atom_namespace_is_undetected() {
        assert_eq!(classify(None, "<feed><entry/></feed>"), None);
    }

    #[test]
    fn html_document_is_undetected() {
        let body = "<!DOCTYPE html><html><head><title>Blog</title></head><body></body></html>";
        assert_eq!(classify(Some("text/html"), body), None);
    }

    #[test]
    fn leading_whitespace_before_json_brace_is_tolerated() {
        let body = "  \n\t{\"version\":\"https://jsonfeed.org/version/1\",\"items\":[]}";
        assert_eq!(classify(None, body), Some(FeedType::Json));
    }

    #[tokio::test]
    async fn detect_returns_none_on_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = fetcher::build_client().unwrap();
        assert_eq!(detect(&client, &mock_server.uri()).await, None);
    }

    #[tokio::test]
    async fn detect_classifies_served_rss() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<rss version="2.0"><channel></channel></rss>"#),
            )
            .mount(&mock_server)
            .await;

        let client = fetcher::build_client().unwrap();
        assert_eq!(
            detect(&client, &mock_server.uri()).await,
            Some(FeedType::Rss)
        );
    }
}
