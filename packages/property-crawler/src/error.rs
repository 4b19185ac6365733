//! Typed errors for the crawler library.
//!
//! Collaborator errors (fetcher, storage, enricher) are boxed so the engine
//! stays generic over their concrete error types.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while crawling, classifying or persisting pages.
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// Fetch failed (non-2xx, connection error)
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Fetch exceeded the configured timeout
    #[error("timeout fetching {url} after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Page body could not be parsed as HTML
    #[error("parse error for {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Fingerprint/ledger/property persistence failed
    #[error("persistence error: {0}")]
    Persistence(#[source] BoxError),

    /// Enrichment collaborator failed
    #[error("enrichment error: {0}")]
    Enrichment(#[source] BoxError),

    /// Reference page could not be reached during training
    #[error("training source unreachable: {url}")]
    TrainingSourceUnreachable { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error (pattern table import/export)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlerError {
    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence(Box::new(err))
    }

    pub fn fetch<E>(url: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Fetch {
            url: url.into(),
            source: Box::new(err),
        }
    }

    /// Fetch-class failures are recorded in the ledger and never abort a session.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Timeout { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, CrawlerError>;
