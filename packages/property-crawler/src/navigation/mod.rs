//! Navigation controller.
//!
//! Drives a crawl session: a frontier of [`NavigationState`]s processed by a
//! bounded pool of visit tasks. Each visit runs
//! recrawl check → fetch → classify → {Property: enrich, save, fingerprint |
//! Catalog/Unknown: enqueue prioritized children}.

pub mod links;
pub mod rate_limiter;
pub mod visited;

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::classifier::PageClassifier;
use crate::config::CrawlerConfig;
use crate::document::{FeatureExtractor, PageDocument};
use crate::events::{CrawlEvent, SessionStats};
use crate::error::{CrawlerError, Result};
use crate::fields::RegexFieldExtractor;
use crate::fingerprint::content_hash;
use crate::recrawl::RecrawlPolicy;
use crate::traits::{CrawlerStorage, FieldExtractor, PageFetcher, PropertyEnricher};
use crate::types::*;
use crate::urls::{host_key, normalize, normalize_url};

pub use links::LinkFilter;
pub use rate_limiter::{DomainPermit, DomainRateLimiter};
pub use visited::{Admission, VisitedSet};

/// Result of one visit task
#[derive(Debug, Default)]
struct VisitOutcome {
    events: Vec<CrawlEvent>,
    children: Vec<NavigationState>,
}

struct Inner<F, S: CrawlerStorage, E> {
    config: CrawlerConfig,
    fetcher: Arc<F>,
    enricher: Arc<E>,
    extractor: Arc<FeatureExtractor>,
    fields: Arc<dyn FieldExtractor>,
    classifier: Arc<PageClassifier>,
    policy: RecrawlPolicy<S>,
    links: LinkFilter,
    visited: VisitedSet,
    limiter: DomainRateLimiter,
}

pub struct PropertyCrawler<F, S: CrawlerStorage, E> {
    inner: Arc<Inner<F, S, E>>,
}

impl<F, S, E> PropertyCrawler<F, S, E>
where
    F: PageFetcher + 'static,
    S: CrawlerStorage + 'static,
    E: PropertyEnricher + 'static,
{
    pub fn new(
        config: CrawlerConfig,
        fetcher: Arc<F>,
        storage: Arc<S>,
        enricher: Arc<E>,
        classifier: Arc<PageClassifier>,
    ) -> Result<Self> {
        config.validate()?;
        let extractor = Arc::new(FeatureExtractor::new(classifier.config())?);
        Self::with_parts(
            config,
            fetcher,
            storage,
            enricher,
            classifier,
            extractor,
            Arc::new(RegexFieldExtractor::new()?),
        )
    }

    /// Build with a shared feature extractor and a custom field extractor.
    pub fn with_parts(
        config: CrawlerConfig,
        fetcher: Arc<F>,
        storage: Arc<S>,
        enricher: Arc<E>,
        classifier: Arc<PageClassifier>,
        extractor: Arc<FeatureExtractor>,
        fields: Arc<dyn FieldExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        let inner = Inner {
            policy: RecrawlPolicy::new(storage, &config),
            links: LinkFilter::new(config.links.clone(), config.max_depth),
            visited: VisitedSet::new(config.links.visited_capacity),
            limiter: DomainRateLimiter::new(config.parallelism, config.request_delay),
            config,
            fetcher,
            enricher,
            extractor,
            fields,
            classifier,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn policy(&self) -> &RecrawlPolicy<S> {
        &self.inner.policy
    }

    /// Crawl from `seeds` until the frontier is exhausted or `cancel` fires.
    ///
    /// Cancellation stops dequeuing; in-flight visits finish and their
    /// outcomes are still counted.
    pub async fn start_crawl(&self, seeds: &[String], cancel: CancellationToken) -> SessionStats {
        let mut stats = SessionStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        let mut frontier: VecDeque<NavigationState> = VecDeque::new();

        for seed in seeds {
            match normalize(seed) {
                Ok(url) => match self.inner.visited.admit(url.as_str()) {
                    Admission::New => frontier.push_back(NavigationState::seed(url)),
                    _ => stats.apply(&CrawlEvent::DuplicateSkipped { url }),
                },
                Err(e) => {
                    warn!(seed = %seed, error = %e, "Ignoring invalid seed URL");
                    stats.failed += 1;
                }
            }
        }

        info!(seeds = frontier.len(), workers = self.inner.config.workers, "Crawl session started");

        let mut tasks = JoinSet::new();
        loop {
            if cancel.is_cancelled() {
                stats.cancelled = true;
            } else {
                while tasks.len() < self.inner.config.workers {
                    let Some(state) = frontier.pop_front() else {
                        break;
                    };
                    let inner = self.inner.clone();
                    tasks.spawn(async move { inner.visit(state).await });
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok(outcome) => {
                    stats.apply_all(&outcome.events);
                    if !stats.cancelled {
                        self.enqueue(outcome.children, &mut frontier, &mut stats);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Visit task panicked");
                    stats.failed += 1;
                }
            }
        }

        if let Err(e) = self.inner.enricher.flush().await {
            warn!(error = %e, "Failed to flush pending enrichment work");
        }
        self.inner.visited.clear();
        stats.finished_at = Some(Utc::now());

        info!(
            pages_visited = stats.pages_visited,
            properties_found = stats.properties_found,
            properties_saved = stats.properties_saved,
            skipped_duplicate = stats.skipped_duplicate,
            skipped_recent = stats.skipped_recent,
            skipped_catalog = stats.skipped_catalog,
            rejected_strict = stats.rejected_strict,
            failed = stats.failed,
            persistence_failures = stats.persistence_failures,
            enrichment_calls = stats.enrichment_calls,
            cancelled = stats.cancelled,
            "Crawl session finished"
        );
        stats
    }

    fn enqueue(
        &self,
        children: Vec<NavigationState>,
        frontier: &mut VecDeque<NavigationState>,
        stats: &mut SessionStats,
    ) {
        for child in children {
            match self.inner.visited.admit(child.url.as_str()) {
                Admission::New => frontier.push_back(child),
                Admission::Duplicate => stats.apply(&CrawlEvent::DuplicateSkipped { url: child.url }),
                Admission::Full => {
                    warn!(url = %child.url, "Visited set full, dropping link");
                }
            }
        }
    }
}

impl<F, S, E> Inner<F, S, E>
where
    F: PageFetcher,
    S: CrawlerStorage,
    E: PropertyEnricher,
{
    async fn visit(&self, state: NavigationState) -> VisitOutcome {
        let mut outcome = VisitOutcome::default();
        let url = state.url.clone();

        match self.policy.should_process(&url).await {
            Ok(decision) if !decision.process => {
                debug!(url = %url, reason = decision.reason.as_str(), "Skipping URL");
                outcome.events.push(CrawlEvent::PageSkipped {
                    url,
                    reason: decision.reason.as_str().to_string(),
                });
                return outcome;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(url = %url, error = %e, "Could not read crawl history");
                outcome.events.push(CrawlEvent::PersistenceFailed {
                    url,
                    error: e.to_string(),
                });
                return outcome;
            }
        }

        let raw = match self.fetch(&url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                outcome.events.push(CrawlEvent::FetchFailed {
                    url: url.clone(),
                    error: e.to_string(),
                });
                self.record(&url, LedgerStatus::Failed, Some(e.to_string()), &mut outcome.events)
                    .await;
                return outcome;
            }
        };
        outcome.events.push(CrawlEvent::PageFetched {
            url: url.clone(),
            depth: state.depth,
        });

        let document = match self.extractor.parse(&raw) {
            Ok(document) => document,
            Err(e) => {
                let verdict = self.classifier.unparseable(e.to_string(), Tier::Permissive);
                debug!(url = %url, error = %e, "Unparseable page, scanning links leniently");
                outcome.events.push(classified(&url, &verdict));

                let links = self.extractor.lenient_links(&raw.final_url, &raw.body);
                outcome.children = self.links.select(&raw.final_url, state.depth, &links);
                self.record(&url, LedgerStatus::Skipped, Some(e.to_string()), &mut outcome.events)
                    .await;
                return outcome;
            }
        };

        let verdict = self.classifier.classify(&document, Tier::Permissive);
        outcome.events.push(classified(&url, &verdict));

        match verdict.page_type {
            PageType::Property => {
                // Property pages are leaves
                self.handle_property(&url, &document, &verdict, &mut outcome.events)
                    .await;
            }
            PageType::Catalog | PageType::Unknown => {
                outcome.children = self
                    .links
                    .select(&document.final_url, state.depth, &document.links);
                outcome.events.push(CrawlEvent::LinksEnqueued {
                    url: url.clone(),
                    depth: state.depth,
                    count: outcome.children.len(),
                });
                self.record(&url, LedgerStatus::Skipped, None, &mut outcome.events)
                    .await;
            }
        }

        outcome
    }

    async fn fetch(&self, url: &Url) -> Result<RawPage> {
        let domain = host_key(url);
        let _permit = self
            .limiter
            .acquire(&domain)
            .await
            .map_err(|e| CrawlerError::fetch(url.as_str(), e))?;

        match tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(CrawlerError::fetch(url.as_str(), e)),
            Err(_) => Err(CrawlerError::Timeout {
                url: url.to_string(),
                secs: self.config.fetch_timeout.as_secs(),
            }),
        }
    }

    async fn handle_property(
        &self,
        url: &Url,
        document: &PageDocument,
        verdict: &ClassificationVerdict,
        events: &mut Vec<CrawlEvent>,
    ) {
        let gate = match self.config.strictness {
            Tier::Strict => self.classifier.classify(document, Tier::Strict),
            Tier::Permissive => verdict.clone(),
        };
        if !gate.is_property() {
            debug!(url = %url, stage = gate.stage.as_str(), "Property rejected by strict tier");
            events.push(CrawlEvent::PropertyRejected {
                url: url.clone(),
                stage: gate.stage,
            });
            self.record(
                url,
                LedgerStatus::Skipped,
                Some(format!("not a property under {} tier", gate.tier.as_str())),
                events,
            )
            .await;
            return;
        }

        if let Err(e) = self.save_property(url, document, &gate, events).await {
            warn!(url = %url, error = %e, "Property not persisted, will retry next cycle");
            events.push(CrawlEvent::PersistenceFailed {
                url: url.clone(),
                error: e.to_string(),
            });
        }
    }

    /// Maybe enrich, then persist. The fingerprint is written only after the
    /// record and its ledger entry, so a failed save is retried next cycle.
    async fn save_property(
        &self,
        url: &Url,
        document: &PageDocument,
        verdict: &ClassificationVerdict,
        events: &mut Vec<CrawlEvent>,
    ) -> Result<()> {
        let fields = self.fields.extract(document);
        let hash = content_hash(&fields);
        let listings = listings_observed(document);

        let mut record = PropertyRecord {
            url: url.to_string(),
            normalized_url: normalize_url(url)?.to_string(),
            domain: host_key(url),
            fields,
            content_hash: hash,
            confidence: verdict.confidence,
            enriched: false,
            enrichment: None,
            discovered_at: Utc::now(),
        };

        let decision = self.policy.should_use_ai_for(url, &record.content_hash).await?;
        let reason = decision.reason.as_str().to_string();
        if decision.use_ai {
            match self.enricher.process_property_data(&record).await {
                Ok(enrichment) => {
                    record.enriched = true;
                    record.enrichment = Some(enrichment);
                    events.push(CrawlEvent::EnrichmentApplied {
                        url: url.clone(),
                        reason,
                    });
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Enrichment failed, saving unenriched record");
                    events.push(CrawlEvent::EnrichmentFailed {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        } else {
            debug!(url = %url, reason = %reason, "Skipping enrichment");
            events.push(CrawlEvent::EnrichmentSkipped {
                url: url.clone(),
                reason,
            });
        }

        self.policy
            .storage()
            .save_property(&record)
            .await
            .map_err(CrawlerError::persistence)?;

        self.policy
            .record_outcome(url, LedgerStatus::Success, None)
            .await?;

        info!(url = %url, enriched = record.enriched, listings, "Saved property");
        events.push(CrawlEvent::PropertySaved {
            url: url.clone(),
            enriched: record.enriched,
        });

        if self.config.enable_fingerprinting {
            if let Err(e) = self
                .policy
                .save_page_fingerprint(url, &record.content_hash, listings, record.enriched)
                .await
            {
                warn!(url = %url, error = %e, "Failed to save page fingerprint");
                events.push(CrawlEvent::PersistenceFailed {
                    url: url.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn record(
        &self,
        url: &Url,
        status: LedgerStatus,
        error_message: Option<String>,
        events: &mut Vec<CrawlEvent>,
    ) {
        if let Err(e) = self.policy.record_outcome(url, status, error_message).await {
            warn!(url = %url, status = status.as_str(), error = %e, "Failed to write ledger entry");
            events.push(CrawlEvent::PersistenceFailed {
                url: url.clone(),
                error: e.to_string(),
            });
        }
    }
}

/// Listing units a property page shows, itself included. Related-listing
/// grids push this above the busy-page threshold.
fn listings_observed(document: &PageDocument) -> u32 {
    u32::try_from(document.features.card_count.max(1)).unwrap_or(u32::MAX)
}

fn classified(url: &Url, verdict: &ClassificationVerdict) -> CrawlEvent {
    CrawlEvent::PageClassified {
        url: url.clone(),
        page_type: verdict.page_type,
        stage: verdict.stage,
        confidence: verdict.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::storage::MemoryStorage;
    use crate::testing::{MockEnricher, MockFetcher};
    use std::time::Duration;

    struct FixedFields;

    impl FieldExtractor for FixedFields {
        fn extract(&self, _document: &PageDocument) -> SalientFields {
            SalientFields {
                price: Some("R$ 1".into()),
                ..Default::default()
            }
        }
    }

    const LISTING: &str = r#"<html><body><h1>Casa</h1><p>R$ 900.000</p>
        <p>Código do imóvel: 7</p><a href="/visita">Agendar visita</a></body></html>"#;

    #[tokio::test]
    async fn test_custom_field_extractor_drives_fingerprint() {
        let fetcher = Arc::new(MockFetcher::new().with_html("https://imob.com.br/imovel/casa-007", LISTING));
        let storage = Arc::new(MemoryStorage::new());
        let classifier = Arc::new(PageClassifier::new(ClassifierConfig::default()));
        let extractor = Arc::new(FeatureExtractor::new(classifier.config()).unwrap());

        let crawler = PropertyCrawler::with_parts(
            CrawlerConfig::default().with_request_delay(Duration::ZERO),
            fetcher,
            storage.clone(),
            Arc::new(MockEnricher::new()),
            classifier,
            extractor,
            Arc::new(FixedFields),
        )
        .unwrap();
        let stats = crawler
            .start_crawl(
                &["https://imob.com.br/imovel/casa-007".to_string()],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(stats.properties_saved, 1);
        let record = &storage.properties()[0];
        assert_eq!(record.fields.price.as_deref(), Some("R$ 1"));
        assert_eq!(
            record.content_hash,
            content_hash(&SalientFields {
                price: Some("R$ 1".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = PropertyCrawler::new(
            CrawlerConfig::default().with_workers(0),
            Arc::new(MockFetcher::new()),
            Arc::new(MemoryStorage::new()),
            Arc::new(MockEnricher::new()),
            Arc::new(PageClassifier::new(ClassifierConfig::default())),
        );
        assert!(matches!(result, Err(CrawlerError::Config(_))));
    }
}
