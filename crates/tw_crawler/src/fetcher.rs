use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use tw_core::{CrawlConfig, Error, Result};

const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Retrieves the HTML body behind a url.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain GET requests with a fixed user agent and a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    retry_pause: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retries: config.fetch_retries,
            retry_pause: RETRY_PAUSE,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(%url, bytes = body.len(), "Fetched page");
                    return Ok(body);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(%url, error = %e, attempt, retries = self.retries, "Fetch failed, retrying");
                    tokio::time::sleep(self.retry_pause).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages and records every requested url.
    #[derive(Default)]
    pub struct MockFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn requested(&self, url: &str) -> bool {
            self.requests.lock().unwrap().iter().any(|u| u == url)
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Scraping(format!("404 for {}", url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers one connection per canned `(status, body)` and hands back the
    /// raw request heads it received.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                requests.push(String::from_utf8_lossy(&head).into_owned());

                let reply = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });

        (format!("http://{}/berita/1", addr), handle)
    }

    fn fetcher(retries: u32) -> HttpFetcher {
        let config = CrawlConfig {
            fetch_retries: retries,
            ..CrawlConfig::default()
        };
        let mut fetcher = HttpFetcher::new(&config).unwrap();
        fetcher.retry_pause = Duration::from_millis(10);
        fetcher
    }

    fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
        request.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    #[tokio::test]
    async fn test_error_status_is_a_failure() {
        let (url, server) = serve(vec![(500, "boom")]).await;

        let result = fetcher(0).fetch(&url).await;
        assert!(matches!(result, Err(Error::Http(_))));
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_error_status() {
        let (url, server) = serve(vec![(500, "boom"), (200, "<p>ok</p>")]).await;

        let body = fetcher(1).fetch(&url).await.unwrap();
        assert_eq!(body, "<p>ok</p>");
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (url, server) = serve(vec![(503, "busy"), (503, "busy")]).await;

        assert!(fetcher(1).fetch(&url).await.is_err());
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sends_configured_user_agent() {
        let (url, server) = serve(vec![(200, "<h1>Batik</h1>")]).await;

        fetcher(0).fetch(&url).await.unwrap();
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /berita/1 "));
        assert_eq!(
            header(&requests[0], "user-agent"),
            Some(CrawlConfig::default().user_agent.as_str())
        );
    }

    #[tokio::test]
    async fn test_mock_fetcher_records_requests() {
        let fetcher = mock::MockFetcher::new().with_page("https://example.com/a", "<p>a</p>");
        assert!(fetcher.fetch("https://example.com/a").await.is_ok());
        assert!(fetcher.fetch("https://example.com/missing").await.is_err());
        assert_eq!(fetcher.requests().len(), 2);
        assert!(fetcher.requested("https://example.com/missing"));
    }
}
