//! Page transport: one HTTP GET per page of the paginated service.
//!
//! [`PageTransport`] is the seam the fetcher retries around. The
//! production implementation is [`HttpTransport`]; tests script their own.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::retry::classify;
use crate::{SourceError, TransportError};

const USER_AGENT: &str = concat!("water-norms/", env!("CARGO_PKG_VERSION"));

/// One page of the paginated service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    /// The page's record batch.
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    /// Full URL of the next page, `None` on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

/// Fetches a single page by its request target.
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// Requests `target` and decodes the page.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] for any failure; all of them are
    /// considered recoverable by the caller.
    async fn get_page(&self, target: &str) -> Result<Page, TransportError>;
}

/// [`PageTransport`] over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn get_page(&self, target: &str) -> Result<Page, TransportError> {
        let response = self
            .client
            .get(target)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| classify(&e))?;

        // Hub'Eau answers 206 for every page but the last.
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Unclassified(format!("HTTP {status}")));
        }

        response.json::<Page>().await.map_err(|e| classify(&e))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    use super::*;

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Answers a single request with `response` and returns its URL.
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/observations?page=1")
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn partial_content_page_is_a_success() {
        let url = serve_once(response(
            "206 Partial Content",
            r#"{"data": [{"x": 1}], "next": "http://localhost/observations?page=2"}"#,
        ))
        .await;

        let page = transport().get_page(&url).await.unwrap();
        assert_eq!(page.data, vec![serde_json::json!({"x": 1})]);
        assert_eq!(
            page.next.as_deref(),
            Some("http://localhost/observations?page=2")
        );
    }

    #[tokio::test]
    async fn server_error_is_unclassified() {
        let url = serve_once(response("500 Internal Server Error", "{}")).await;

        let err = transport().get_page(&url).await.unwrap_err();
        assert!(
            matches!(&err, TransportError::Unclassified(msg) if msg.contains("500")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn undecodable_body_is_unclassified() {
        let url = serve_once(response("200 OK", "<html>maintenance</html>")).await;

        let err = transport().get_page(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::Unclassified(_)), "{err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::from_client(reqwest::Client::new());
        let err = transport
            .get_page(&format!("http://{addr}/observations"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailure(_)), "{err:?}");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let err = transport
            .get_page(&format!("http://{addr}/observations"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "{err:?}");
    }

    #[test]
    fn page_decodes_data_and_next() {
        let page: Page = serde_json::from_value(serde_json::json!({
            "count": 3,
            "first": "https://example.org/a?page=1",
            "next": "https://example.org/a?page=2",
            "data": [{"x": 1}, {"x": 2}]
        }))
        .unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.next.as_deref(), Some("https://example.org/a?page=2"));
    }

    #[test]
    fn null_next_marks_last_page() {
        let page: Page =
            serde_json::from_value(serde_json::json!({"data": [], "next": null})).unwrap();
        assert!(page.next.is_none());
    }

    #[test]
    fn missing_fields_default() {
        let page: Page = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(page, Page::default());
    }
}
