use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::document::PageDocument;
use crate::types::*;

// ============================================================================
// STORAGE: Fingerprints, URL ledger, property records
// ============================================================================

/// Persistence collaborator.
///
/// Writers for different URLs never conflict; concurrent writes to the same
/// URL are last-write-wins.
#[async_trait]
pub trait CrawlerStorage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get_fingerprint(&self, url: &str) -> Result<Option<PageFingerprint>, Self::Error>;

    async fn save_fingerprint(&self, fingerprint: &PageFingerprint) -> Result<(), Self::Error>;

    /// Latest ledger entry for a normalized URL
    async fn get_processed_url(
        &self,
        normalized_url: &str,
    ) -> Result<Option<UrlLedgerEntry>, Self::Error>;

    async fn save_processed_url(&self, entry: &UrlLedgerEntry) -> Result<(), Self::Error>;

    /// Upsert a property record keyed by normalized URL
    async fn save_property(&self, property: &PropertyRecord) -> Result<(), Self::Error>;

    /// Delete ledger entries and fingerprints not touched within `age`.
    /// Returns the number of rows removed.
    async fn cleanup_older_than(&self, age: Duration) -> Result<u64, Self::Error>;
}

// ============================================================================
// PAGE FETCHER: Network access
// ============================================================================

#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a single page. Non-2xx responses are errors.
    async fn fetch(&self, url: &Url) -> Result<RawPage, Self::Error>;
}

// ============================================================================
// ENRICHMENT: Costly post-processing of property data (e.g. LLM)
// ============================================================================

#[async_trait]
pub trait PropertyEnricher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Enrich extracted data. Best-effort: callers fall back to the
    /// unenriched record on error.
    async fn process_property_data(
        &self,
        record: &PropertyRecord,
    ) -> Result<serde_json::Value, Self::Error>;

    /// Flush buffered work. Called once at session end.
    async fn flush(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ============================================================================
// FIELD EXTRACTION: Salient fields used for fingerprints and records
// ============================================================================

pub trait FieldExtractor: Send + Sync {
    fn extract(&self, document: &PageDocument) -> SalientFields;
}
