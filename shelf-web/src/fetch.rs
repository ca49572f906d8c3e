//! Page retrieval behind a trait so callers and tests can swap the transport.

use async_trait::async_trait;
use shelf_http::{FetchError, HttpClient};
use url::Url;

/// Retrieves the raw HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Concrete fetcher backed by the shared [`HttpClient`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let page = self.client.get_html(url).await?;
        if page.url != *url {
            tracing::debug!(requested = %url, final_url = %page.url, "fetch.redirected");
        }
        Ok(page.body)
    }
}
