//! Testing utilities including mock collaborators.
//!
//! These let applications and tests drive the crawler without network or
//! enrichment calls.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use url::Url;

use crate::traits::{PageFetcher, PropertyEnricher};
use crate::types::{PropertyRecord, RawPage};

/// Error returned by the mocks
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("mock connection refused: {0}")]
    ConnectionRefused(String),

    #[error("no mock page for {0}")]
    NotFound(String),

    #[error("mock enrichment failure")]
    EnrichmentFailed,
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// A mock fetcher serving predefined HTML by URL.
#[derive(Default, Clone)]
pub struct MockFetcher {
    /// Predefined pages by URL
    pages: Arc<RwLock<HashMap<String, String>>>,

    /// URLs that should fail
    fail_urls: Arc<RwLock<HashSet<String>>>,

    /// Artificial latency per fetch
    latency: Option<Duration>,

    /// Call tracking
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predefined page.
    pub fn with_html(self, url: impl AsRef<str>, html: impl Into<String>) -> Self {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(url.as_ref()), html.into());
        self
    }

    /// Mark a URL as failing.
    pub fn fail_url(self, url: impl AsRef<str>) -> Self {
        self.fail_urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(url.as_ref()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the HTML served for a URL.
    pub fn set_html(&self, url: impl AsRef<str>, html: impl Into<String>) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(url.as_ref()), html.into());
    }

    /// All URLs fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        let wanted = key(url);
        self.calls().iter().filter(|u| **u == wanted).count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    type Error = MockError;

    async fn fetch(&self, url: &Url) -> Result<RawPage, Self::Error> {
        let url_key = url.to_string();
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url_key.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self
            .fail_urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&url_key)
        {
            return Err(MockError::ConnectionRefused(url_key));
        }

        let html = self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&url_key)
            .cloned()
            .ok_or(MockError::NotFound(url_key))?;

        Ok(RawPage::new(url.clone(), html))
    }
}

/// A mock enricher counting calls.
#[derive(Default, Clone)]
pub struct MockEnricher {
    calls: Arc<AtomicUsize>,
    flushes: Arc<AtomicUsize>,
    fail: bool,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every enrichment call fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PropertyEnricher for MockEnricher {
    type Error = MockError;

    async fn process_property_data(
        &self,
        record: &PropertyRecord,
    ) -> Result<serde_json::Value, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MockError::EnrichmentFailed);
        }
        Ok(serde_json::json!({
            "source": "mock",
            "url": record.url,
            "price": record.fields.price,
        }))
    }

    async fn flush(&self) -> Result<(), Self::Error> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
