use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Raw response for one result page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final url after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// The page-loading capability the crawler runs on.
///
/// Implementations only transport pages; blocked detection and parsing
/// happen in the crawler so every backend gets the same treatment.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Plain HTTP session backend built on reqwest, with a cookie store so
/// consent and session cookies survive between pages.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(30)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        debug!(
            "Fetched {} ({} bytes, status {}) in {:?}",
            final_url,
            body.len(),
            status,
            start.elapsed()
        );

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}
