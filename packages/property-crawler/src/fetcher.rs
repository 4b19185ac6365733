//! HTTP page fetcher.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::CrawlerConfig;
use crate::traits::PageFetcher;
use crate::types::RawPage;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: u16 },
}

/// Fetches pages with `reqwest`, following redirects.
///
/// Rate limiting is done per domain by the navigation controller, not here.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, FetchError> {
        Self::new(config.user_agent.clone(), config.fetch_timeout)
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    type Error = FetchError;

    async fn fetch(&self, url: &Url) -> Result<RawPage, Self::Error> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "pt-BR,pt;q=0.9,en;q=0.5")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                FetchError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(RawPage {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }
}
