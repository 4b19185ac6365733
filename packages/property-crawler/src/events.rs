use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::types::{PageType, StageKind};

/// Facts produced by one URL visit. The controller folds them into
/// [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    // ============================================================================
    // Frontier events
    // ============================================================================
    DuplicateSkipped {
        url: Url,
    },

    PageSkipped {
        url: Url,
        reason: String,
    },

    LinksEnqueued {
        url: Url,
        depth: usize,
        count: usize,
    },

    // ============================================================================
    // Page events
    // ============================================================================
    PageFetched {
        url: Url,
        depth: usize,
    },

    FetchFailed {
        url: Url,
        error: String,
    },

    PageClassified {
        url: Url,
        page_type: PageType,
        stage: StageKind,
        confidence: f32,
    },

    // ============================================================================
    // Property events
    // ============================================================================
    PropertyRejected {
        url: Url,
        stage: StageKind,
    },

    PropertySaved {
        url: Url,
        enriched: bool,
    },

    EnrichmentSkipped {
        url: Url,
        reason: String,
    },

    EnrichmentApplied {
        url: Url,
        reason: String,
    },

    EnrichmentFailed {
        url: Url,
        error: String,
    },

    PersistenceFailed {
        url: Url,
        error: String,
    },
}

/// End-of-session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub pages_visited: usize,
    pub properties_found: usize,
    pub properties_saved: usize,
    pub skipped_duplicate: usize,
    pub skipped_recent: usize,
    pub skipped_catalog: usize,
    pub rejected_strict: usize,
    pub failed: usize,
    pub persistence_failures: usize,
    pub enrichment_calls: usize,
    pub enrichment_failures: usize,
    pub verdict_breakdown: BTreeMap<PageType, usize>,
    /// Pages fetched at each depth
    pub depth_breakdown: BTreeMap<usize, usize>,
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    pub fn apply(&mut self, event: &CrawlEvent) {
        match event {
            CrawlEvent::DuplicateSkipped { .. } => self.skipped_duplicate += 1,
            CrawlEvent::PageSkipped { .. } => self.skipped_recent += 1,
            CrawlEvent::LinksEnqueued { .. } => {}
            CrawlEvent::PageFetched { depth, .. } => {
                self.pages_visited += 1;
                *self.depth_breakdown.entry(*depth).or_default() += 1;
            }
            CrawlEvent::FetchFailed { .. } => self.failed += 1,
            CrawlEvent::PageClassified { page_type, .. } => {
                *self.verdict_breakdown.entry(*page_type).or_default() += 1;
                match page_type {
                    PageType::Property => self.properties_found += 1,
                    PageType::Catalog => self.skipped_catalog += 1,
                    PageType::Unknown => {}
                }
            }
            CrawlEvent::PropertyRejected { .. } => self.rejected_strict += 1,
            CrawlEvent::PropertySaved { .. } => self.properties_saved += 1,
            CrawlEvent::EnrichmentSkipped { .. } => {}
            CrawlEvent::EnrichmentApplied { .. } => self.enrichment_calls += 1,
            CrawlEvent::EnrichmentFailed { .. } => {
                self.enrichment_calls += 1;
                self.enrichment_failures += 1;
            }
            CrawlEvent::PersistenceFailed { .. } => self.persistence_failures += 1,
        }
    }

    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a CrawlEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    pub fn verdicts(&self, page_type: PageType) -> usize {
        self.verdict_breakdown.get(&page_type).copied().unwrap_or(0)
    }
}
