//! Incremental recrawl policy.
//!
//! Two independent decisions read the same fingerprint record:
//! [`RecrawlPolicy::should_process`] (fetch or skip) and
//! [`RecrawlPolicy::should_use_ai`] (enrich or skip, with
//! [`RecrawlPolicy::should_use_ai_for`] judging content not yet saved).
//! [`RecrawlPolicy::save_page_fingerprint`] is the only writer of
//! `change_detected`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{CrawlerError, Result};
use crate::traits::CrawlerStorage;
use crate::types::{LedgerStatus, PageFingerprint, UrlLedgerEntry};
use crate::urls::normalize_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessReason {
    RecentlyProcessed,
    FingerprintFresh,
    NoChangesDetected,
    NewUrl,
    Stale,
}

impl ProcessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessReason::RecentlyProcessed => "recently_processed",
            ProcessReason::FingerprintFresh => "fingerprint_fresh",
            ProcessReason::NoChangesDetected => "no_changes_detected",
            ProcessReason::NewUrl => "new_url",
            ProcessReason::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDecision {
    pub process: bool,
    pub reason: ProcessReason,
}

impl ProcessDecision {
    fn process(reason: ProcessReason) -> Self {
        Self {
            process: true,
            reason,
        }
    }

    fn skip(reason: ProcessReason) -> Self {
        Self {
            process: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiReason {
    FingerprintingDisabled,
    FirstTime,
    ContentChanged,
    AiCooldown,
    BusyPage,
    NoChanges,
}

impl AiReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiReason::FingerprintingDisabled => "fingerprinting_disabled",
            AiReason::FirstTime => "first_time",
            AiReason::ContentChanged => "content_changed",
            AiReason::AiCooldown => "ai_cooldown",
            AiReason::BusyPage => "busy_page",
            AiReason::NoChanges => "no_changes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiDecision {
    pub use_ai: bool,
    pub reason: AiReason,
}

impl AiDecision {
    fn use_ai(reason: AiReason) -> Self {
        Self {
            use_ai: true,
            reason,
        }
    }

    fn skip(reason: AiReason) -> Self {
        Self {
            use_ai: false,
            reason,
        }
    }
}

pub struct RecrawlPolicy<S: CrawlerStorage> {
    storage: Arc<S>,
    max_age: chrono::Duration,
    ai_cooldown: chrono::Duration,
    enable_fingerprinting: bool,
    busy_page_threshold: u32,
}

impl<S: CrawlerStorage> RecrawlPolicy<S> {
    pub fn new(storage: Arc<S>, config: &CrawlerConfig) -> Self {
        Self {
            storage,
            max_age: to_chrono(config.max_age),
            ai_cooldown: to_chrono(config.ai_cooldown),
            enable_fingerprinting: config.enable_fingerprinting,
            busy_page_threshold: config.busy_page_threshold,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Fetch-or-skip decision from the ledger and the fingerprint.
    pub async fn should_process(&self, url: &Url) -> Result<ProcessDecision> {
        let key = ledger_key(url)?;
        let now = Utc::now();

        let entry = self
            .storage
            .get_processed_url(&key)
            .await
            .map_err(CrawlerError::persistence)?;
        if let Some(entry) = &entry {
            if entry.status == LedgerStatus::Success && now - entry.processed_at < self.max_age {
                return Ok(ProcessDecision::skip(ProcessReason::RecentlyProcessed));
            }
        }

        if self.enable_fingerprinting {
            let fingerprint = self
                .storage
                .get_fingerprint(&key)
                .await
                .map_err(CrawlerError::persistence)?;
            if let Some(fp) = fingerprint {
                let age = now - fp.last_crawled;
                if age < self.max_age {
                    return Ok(ProcessDecision::skip(ProcessReason::FingerprintFresh));
                }
                if age < self.max_age * 2 && !fp.change_detected {
                    return Ok(ProcessDecision::skip(ProcessReason::NoChangesDetected));
                }
                return Ok(ProcessDecision::process(ProcessReason::Stale));
            }
        }

        Ok(match entry {
            Some(_) => ProcessDecision::process(ProcessReason::Stale),
            None => ProcessDecision::process(ProcessReason::NewUrl),
        })
    }

    /// Enrich-or-skip decision from the stored fingerprint.
    pub async fn should_use_ai(&self, url: &Url) -> Result<AiDecision> {
        if !self.enable_fingerprinting {
            return Ok(AiDecision::use_ai(AiReason::FingerprintingDisabled));
        }
        let fingerprint = self.fingerprint(url).await?;
        Ok(self.ai_decision(fingerprint.as_ref(), None))
    }

    /// Enrich-or-skip decision for content about to be saved with
    /// `content_hash`. Nothing is written, so the decision can be made before
    /// the record is persisted.
    pub async fn should_use_ai_for(&self, url: &Url, content_hash: &str) -> Result<AiDecision> {
        if !self.enable_fingerprinting {
            return Ok(AiDecision::use_ai(AiReason::FingerprintingDisabled));
        }
        let fingerprint = self.fingerprint(url).await?;
        Ok(self.ai_decision(fingerprint.as_ref(), Some(content_hash)))
    }

    fn ai_decision(&self, fp: Option<&PageFingerprint>, pending_hash: Option<&str>) -> AiDecision {
        let Some(fp) = fp else {
            return AiDecision::use_ai(AiReason::FirstTime);
        };

        let changed = match pending_hash {
            Some(hash) => fp.content_hash != hash,
            None => fp.change_detected,
        };
        if changed {
            return AiDecision::use_ai(AiReason::ContentChanged);
        }

        let Some(last_ai) = fp.last_ai_processed.filter(|_| fp.ai_enriched) else {
            return AiDecision::use_ai(AiReason::FirstTime);
        };

        if Utc::now() - last_ai < self.ai_cooldown {
            return AiDecision::skip(AiReason::AiCooldown);
        }
        if fp.property_count > self.busy_page_threshold {
            return AiDecision::use_ai(AiReason::BusyPage);
        }
        AiDecision::skip(AiReason::NoChanges)
    }

    async fn fingerprint(&self, url: &Url) -> Result<Option<PageFingerprint>> {
        self.storage
            .get_fingerprint(&ledger_key(url)?)
            .await
            .map_err(CrawlerError::persistence)
    }

    /// Store the latest hash, flagging a change when it differs from the
    /// stored one. Last write wins.
    pub async fn save_page_fingerprint(
        &self,
        url: &Url,
        content_hash: &str,
        property_count: u32,
        ai_used: bool,
    ) -> Result<PageFingerprint> {
        let key = ledger_key(url)?;
        let now = Utc::now();
        let previous = self.fingerprint(url).await?;

        let fingerprint = match previous {
            None => PageFingerprint {
                url: key,
                content_hash: content_hash.to_string(),
                last_crawled: now,
                last_modified: now,
                property_count,
                change_detected: false,
                ai_enriched: ai_used,
                last_ai_processed: ai_used.then_some(now),
            },
            Some(previous) => {
                let changed = previous.content_hash != content_hash;
                PageFingerprint {
                    url: key,
                    content_hash: content_hash.to_string(),
                    last_crawled: now,
                    last_modified: if changed { now } else { previous.last_modified },
                    property_count,
                    change_detected: changed,
                    ai_enriched: ai_used || previous.ai_enriched,
                    last_ai_processed: if ai_used {
                        Some(now)
                    } else {
                        previous.last_ai_processed
                    },
                }
            }
        };

        self.storage
            .save_fingerprint(&fingerprint)
            .await
            .map_err(CrawlerError::persistence)?;

        debug!(
            url = %fingerprint.url,
            change_detected = fingerprint.change_detected,
            "Saved page fingerprint"
        );
        Ok(fingerprint)
    }

    /// Write one ledger entry for a visit attempt.
    pub async fn record_outcome(
        &self,
        url: &Url,
        status: LedgerStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let entry = UrlLedgerEntry {
            url: url.to_string(),
            normalized_url: ledger_key(url)?,
            status,
            processed_at: Utc::now(),
            error_message,
        };
        self.storage
            .save_processed_url(&entry)
            .await
            .map_err(CrawlerError::persistence)
    }

    /// Drop history older than `age`.
    pub async fn cleanup_older_than(&self, age: Duration) -> Result<u64> {
        self.storage
            .cleanup_older_than(age)
            .await
            .map_err(CrawlerError::persistence)
    }
}

fn ledger_key(url: &Url) -> Result<String> {
    normalize_url(url).map(|u| u.to_string())
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}
