use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// ============================================================================
// ENUMS (type-safe states)
// ============================================================================

/// What a page is, as far as the crawler is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Property,
    Catalog,
    Unknown,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Property => "property",
            PageType::Catalog => "catalog",
            PageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier strictness tier.
///
/// `Permissive` drives navigation, where missing a catalog or a property is
/// expensive. `Strict` gates persistence, where saving a catalog as a
/// property is expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Permissive,
    #[default]
    Strict,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Permissive => "permissive",
            Tier::Strict => "strict",
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Tier::Permissive),
            "strict" => Ok(Tier::Strict),
            other => Err(format!("unknown classifier strictness: {other}")),
        }
    }
}

/// Pipeline stage that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Lexical,
    CountHeuristic,
    PatternTable,
    Structural,
    StrictEvidence,
    /// No stage decided (or the page could not be parsed)
    Fallthrough,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Lexical => "lexical",
            StageKind::CountHeuristic => "count_heuristic",
            StageKind::PatternTable => "pattern_table",
            StageKind::Structural => "structural",
            StageKind::StrictEvidence => "strict_evidence",
            StageKind::Fallthrough => "fallthrough",
        }
    }
}

/// Evidence contributing to a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    PhraseMatch { class: PageType, phrases: Vec<String> },
    PriceCount { count: usize },
    RoomKeywordCount { count: usize },
    UrlPattern { pattern: String, score: f32 },
    ContentSimilarity { class: PageType, score: f32 },
    CardContainers { count: usize },
    Gallery { images: usize },
    DetailBlock,
    AddressPresent,
    Pagination,
    Filters,
    ParseFailure { reason: String },
}

/// Typed classification result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub page_type: PageType,
    pub confidence: f32,
    pub stage: StageKind,
    pub tier: Tier,
    pub signals: Vec<Signal>,
}

impl ClassificationVerdict {
    pub fn new(page_type: PageType, confidence: f32, stage: StageKind, tier: Tier) -> Self {
        Self {
            page_type,
            confidence: confidence.clamp(0.0, 1.0),
            stage,
            tier,
            signals: Vec::new(),
        }
    }

    pub fn unknown(tier: Tier) -> Self {
        Self::new(PageType::Unknown, 0.0, StageKind::Fallthrough, tier)
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn is_property(&self) -> bool {
        self.page_type == PageType::Property
    }
}

/// Outcome recorded for a URL visit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Success,
    Failed,
    Skipped,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Success => "success",
            LedgerStatus::Failed => "failed",
            LedgerStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => LedgerStatus::Success,
            "failed" => LedgerStatus::Failed,
            _ => LedgerStatus::Skipped,
        }
    }
}

/// Link priority used to order and prune the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    High,
    Normal,
    Low,
}

// ============================================================================
// CORE TYPES
// ============================================================================

/// Per-URL change-detection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFingerprint {
    pub url: String,
    pub content_hash: String,
    pub last_crawled: DateTime<Utc>,
    /// Last time the content hash actually changed
    pub last_modified: DateTime<Utc>,
    pub property_count: u32,
    pub change_detected: bool,
    pub ai_enriched: bool,
    pub last_ai_processed: Option<DateTime<Utc>>,
}

/// One visit attempt, keyed by normalized URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlLedgerEntry {
    pub url: String,
    pub normalized_url: String,
    pub status: LedgerStatus,
    pub processed_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Frontier entry, lives for one session only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub url: Url,
    pub depth: usize,
    pub priority: PriorityClass,
}

impl NavigationState {
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            priority: PriorityClass::High,
        }
    }
}

/// Salient fields used for fingerprinting and persistence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalientFields {
    pub title: Option<String>,
    pub price: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

impl SalientFields {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.address.is_none() && self.description.is_none()
    }
}

/// A property advertisement ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub fields: SalientFields,
    pub content_hash: String,
    pub confidence: f32,
    pub enriched: bool,
    /// Opaque enrichment payload (the crawler doesn't interpret it)
    pub enrichment: Option<serde_json::Value>,
    pub discovered_at: DateTime<Utc>,
}

/// A fetched page before parsing
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: Url,
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }
}
