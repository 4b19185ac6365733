//! Real-estate listing crawler.
//!
//! Walks agency websites from seed URLs, tells individual property listings
//! apart from catalog/search pages, persists listings, and decides per URL
//! whether a page needs refetching and whether its content needs
//! (expensive) enrichment.
//!
//! # Architecture
//!
//! - [`navigation::PropertyCrawler`] drives a session with a bounded pool of
//!   visit tasks
//! - [`classifier::PageClassifier`] runs a tiered pipeline of cheap-to-expensive
//!   stages over a parsed [`document::PageDocument`]
//! - [`learner::PatternLearner`] learns URL templates and content signatures
//!   from reference pages
//! - [`recrawl::RecrawlPolicy`] answers "process this URL?" and "enrich this
//!   listing?" from the fingerprint store
//! - [`traits`] define the seams: storage, fetching, enrichment and field
//!   extraction

pub mod classifier;
pub mod config;
pub mod document;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod fields;
pub mod fingerprint;
pub mod learner;
pub mod navigation;
pub mod recrawl;
pub mod storage;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;
pub mod urls;

pub use classifier::PageClassifier;
pub use config::{ClassifierConfig, CrawlerConfig, LinkPolicy, TierThresholds};
pub use document::{ContentFeatures, FeatureExtractor, PageDocument};
pub use enrichment::NoopEnricher;
pub use error::{CrawlerError, Result};
pub use events::{CrawlEvent, SessionStats};
pub use fetcher::HttpFetcher;
pub use fields::RegexFieldExtractor;
pub use fingerprint::content_hash;
pub use learner::{LearnedPattern, PatternLearner, PatternTable, ReferenceUrl, TrainingReport};
pub use navigation::PropertyCrawler;
pub use recrawl::{AiDecision, AiReason, ProcessDecision, ProcessReason, RecrawlPolicy};
pub use storage::{MemoryStorage, PostgresStorage};
pub use traits::{CrawlerStorage, FieldExtractor, PageFetcher, PropertyEnricher};
pub use types::*;
