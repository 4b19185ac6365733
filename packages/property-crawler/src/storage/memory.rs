//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::traits::CrawlerStorage;
use crate::types::{PageFingerprint, PropertyRecord, UrlLedgerEntry};

#[derive(Debug, thiserror::Error)]
pub enum MemoryStorageError {
    #[error("write rejected")]
    WriteRejected,
}

/// In-memory fingerprints, ledger and property records.
///
/// Useful for testing and single-run crawls. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    fingerprints: RwLock<HashMap<String, PageFingerprint>>,
    ledger: RwLock<HashMap<String, UrlLedgerEntry>>,
    properties: RwLock<HashMap<String, PropertyRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail, to exercise persistence error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fingerprint(&self, url: &str) -> Option<PageFingerprint> {
        self.fingerprints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn ledger_entry(&self, normalized_url: &str) -> Option<UrlLedgerEntry> {
        self.ledger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(normalized_url)
            .cloned()
    }

    pub fn properties(&self) -> Vec<PropertyRecord> {
        let mut records: Vec<_> = self
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.normalized_url.cmp(&b.normalized_url));
        records
    }

    pub fn property_count(&self) -> usize {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn check_writable(&self) -> Result<(), MemoryStorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryStorageError::WriteRejected);
        }
        Ok(())
    }
}

#[async_trait]
impl CrawlerStorage for MemoryStorage {
    type Error = MemoryStorageError;

    async fn get_fingerprint(&self, url: &str) -> Result<Option<PageFingerprint>, Self::Error> {
        Ok(self.fingerprint(url))
    }

    async fn save_fingerprint(&self, fingerprint: &PageFingerprint) -> Result<(), Self::Error> {
        self.check_writable()?;
        self.fingerprints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint.url.clone(), fingerprint.clone());
        Ok(())
    }

    async fn get_processed_url(
        &self,
        normalized_url: &str,
    ) -> Result<Option<UrlLedgerEntry>, Self::Error> {
        Ok(self.ledger_entry(normalized_url))
    }

    async fn save_processed_url(&self, entry: &UrlLedgerEntry) -> Result<(), Self::Error> {
        self.check_writable()?;
        self.ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.normalized_url.clone(), entry.clone());
        Ok(())
    }

    async fn save_property(&self, property: &PropertyRecord) -> Result<(), Self::Error> {
        self.check_writable()?;
        self.properties
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(property.normalized_url.clone(), property.clone());
        Ok(())
    }

    async fn cleanup_older_than(&self, age: Duration) -> Result<u64, Self::Error> {
        self.check_writable()?;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::days(365 * 100));

        let mut removed = 0u64;
        {
            let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
            let before = ledger.len();
            ledger.retain(|_, entry| entry.processed_at >= cutoff);
            removed += (before - ledger.len()) as u64;
        }
        {
            let mut fingerprints = self
                .fingerprints
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let before = fingerprints.len();
            fingerprints.retain(|_, fp| fp.last_crawled >= cutoff);
            removed += (before - fingerprints.len()) as u64;
        }
        Ok(removed)
    }
}
