use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Identifying request header sent with every outbound fetch.
pub const USER_AGENT: &str = "autofeeds/1.0";

/// Timeout for fetching a registered feed's body.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the one-shot type-detection fetch.
pub const DETECT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from fetching a feed over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx HTTP response
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Body of a fetched feed plus the declared content type, which the type
/// detector consults before sniffing the body.
#[derive(Debug)]
pub struct FetchedBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Build the shared HTTP client used for detection and feed fetches.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Fetch a URL once with a bounded timeout and a size-capped body read.
pub async fn fetch_body(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<FetchedBody, FetchError> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let bytes = read_limited_bytes(response, MAX_BODY_SIZE).await?;

    Ok(FetchedBody {
        content_type,
        bytes,
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: reject oversized bodies from the Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_body_and_content_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<rss version=\"2.0\"></rss>", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let body = fetch_body(&client, &mock_server.uri(), FEED_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(body.content_type.as_deref(), Some("application/rss+xml"));
        assert!(body.bytes.starts_with(b"<rss"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let result = fetch_body(&client, &mock_server.uri(), FEED_TIMEOUT).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 1024]))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let response = tokio::time::timeout(
            FEED_TIMEOUT,
            client.get(mock_server.uri()).send(),
        )
        .await
        .unwrap()
        .unwrap();

        let result = read_limited_bytes(response, 512).await;
        match result.unwrap_err() {
            FetchError::ResponseTooLarge => {}
            e => panic!("Expected ResponseTooLarge, got {:?}", e),
        }
    }
}
