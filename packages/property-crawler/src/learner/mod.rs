//! Pattern learner.
//!
//! Learns URL templates and content signatures from a curated set of
//! reference pages. The table is owned by one [`PatternLearner`] instance and
//! shared by `Arc` with the classifier; it only changes during training,
//! consolidation and import.

pub mod template;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::document::{ContentFeatures, FeatureExtractor};
use crate::error::{CrawlerError, Result};
use crate::traits::PageFetcher;
use crate::types::PageType;
use crate::urls::{base_domain, host_key, normalize};

pub use template::{path_template, template_similarity};

/// Minimum supporting examples before a pattern is kept
pub const MIN_SUPPORT: u32 = 2;

const TABLE_VERSION: u32 = 1;

/// Reference pages fetched concurrently during training
const TRAINING_FETCH_CONCURRENCY: usize = 4;

/// Confidence for a pattern seen `support` times.
///
/// `clamp(0.3 + 0.1 * (support - 1), 0.3, 0.95)`
pub fn pattern_confidence(support: u32) -> f32 {
    (0.3 + 0.1 * support.saturating_sub(1) as f32).clamp(0.3, 0.95)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    UrlTemplate,
    ContentSignature,
}

/// Averaged content features of the pages behind a content signature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureProfile {
    pub price_count: f32,
    pub detail_density: f32,
    pub link_count: f32,
    pub image_count: f32,
    /// Share of samples with pagination
    pub pagination: f32,
    /// Share of samples with filter controls
    pub filters: f32,
    pub samples: u32,
}

impl FeatureProfile {
    pub fn from_features(features: &ContentFeatures) -> Self {
        Self {
            price_count: features.price_count as f32,
            detail_density: features.detail_density,
            link_count: features.link_count as f32,
            image_count: features.image_count as f32,
            pagination: flag(features.has_pagination),
            filters: flag(features.has_filters),
            samples: 1,
        }
    }

    /// Sample-weighted average of two profiles.
    pub fn merge(&self, other: &FeatureProfile) -> FeatureProfile {
        let total = (self.samples + other.samples).max(1);
        let (wa, wb) = (
            self.samples as f32 / total as f32,
            other.samples as f32 / total as f32,
        );
        FeatureProfile {
            price_count: self.price_count * wa + other.price_count * wb,
            detail_density: self.detail_density * wa + other.detail_density * wb,
            link_count: self.link_count * wa + other.link_count * wb,
            image_count: self.image_count * wa + other.image_count * wb,
            pagination: self.pagination * wa + other.pagination * wb,
            filters: self.filters * wa + other.filters * wb,
            samples: total,
        }
    }

    /// Symmetric similarity in `[0, 1]`.
    pub fn similarity(&self, other: &FeatureProfile) -> f32 {
        let price = proximity(self.price_count, other.price_count);
        let density = proximity(self.detail_density, other.detail_density);
        let structure = (proximity(self.link_count, other.link_count)
            + proximity(self.image_count, other.image_count)
            + (1.0 - (self.pagination - other.pagination).abs())
            + (1.0 - (self.filters - other.filters).abs()))
            / 4.0;

        (0.35 * price + 0.25 * density + 0.4 * structure).clamp(0.0, 1.0)
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn proximity(a: f32, b: f32) -> f32 {
    let scale = a.abs().max(b.abs()).max(1.0);
    1.0 - ((a - b).abs() / scale).min(1.0)
}

/// Coarse bucket key for a page's content features.
pub fn content_bucket(features: &ContentFeatures) -> String {
    let price = match features.price_count {
        0 => "0",
        1 => "1",
        2..=4 => "few",
        _ => "many",
    };
    let density = if features.detail_density < 1.0 {
        "low"
    } else if features.detail_density < 4.0 {
        "mid"
    } else {
        "high"
    };
    let images = if features.gallery_images >= 3 || features.image_count >= 8 {
        "gallery"
    } else {
        "few"
    };
    format!(
        "price:{price}|density:{density}|images:{images}|pagination:{}|filters:{}",
        u8::from(features.has_pagination),
        u8::from(features.has_filters)
    )
}

/// A learned URL template or content signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub key: String,
    pub kind: PatternKind,
    pub page_type: PageType,
    pub confidence: f32,
    pub support_count: u32,
    /// Host (without `www.`) or base domain after consolidation
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<FeatureProfile>,
    /// Normalized reference URLs behind `support_count`
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub samples: BTreeSet<String>,
}

impl LearnedPattern {
    fn id(&self) -> PatternId {
        PatternId {
            domain: self.domain.clone(),
            kind: self.kind,
            page_type: self.page_type,
            key: self.key.clone(),
        }
    }

    /// Fold `other` into this pattern. Support only grows by reference URLs
    /// not already counted; patterns without sample URLs add their support
    /// as is.
    fn absorb(&mut self, other: &LearnedPattern) {
        let added = if other.samples.is_empty() {
            other.support_count
        } else {
            let fresh = other.samples.difference(&self.samples).count();
            u32::try_from(fresh).unwrap_or(u32::MAX)
        };
        if added == 0 {
            return;
        }

        self.samples.extend(other.samples.iter().cloned());
        self.support_count = self.support_count.saturating_add(added);
        self.confidence = pattern_confidence(self.support_count);
        self.profile = match (&self.profile, &other.profile) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PatternId {
    domain: String,
    kind: PatternKind,
    page_type: PageType,
    key: String,
}

/// One curated training example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceUrl {
    pub url: String,
    #[serde(default = "default_label")]
    pub label: PageType,
}

fn default_label() -> PageType {
    PageType::Property
}

impl ReferenceUrl {
    pub fn property(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: PageType::Property,
        }
    }

    pub fn catalog(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: PageType::Catalog,
        }
    }
}

/// Outcome of a training pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub fetched: usize,
    pub unreachable: usize,
    pub retained: usize,
    pub discarded: usize,
}

/// Best URL-template match for a URL
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern: LearnedPattern,
    pub score: f32,
}

/// Serialized pattern table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTable {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub patterns: Vec<LearnedPattern>,
}

pub struct PatternLearner {
    extractor: Arc<FeatureExtractor>,
    table: RwLock<BTreeMap<PatternId, LearnedPattern>>,
}

impl PatternLearner {
    pub fn new(extractor: Arc<FeatureExtractor>) -> Self {
        Self {
            extractor,
            table: RwLock::new(BTreeMap::new()),
        }
    }

    /// Fetch every reference page and learn URL and content patterns from it.
    ///
    /// Unreachable references are logged and skipped. Candidate patterns are
    /// merged with the existing table; only those with at least
    /// [`MIN_SUPPORT`] examples are kept.
    pub async fn train<F: PageFetcher>(
        &self,
        references: &[ReferenceUrl],
        fetcher: &F,
    ) -> TrainingReport {
        let mut report = TrainingReport::default();
        let mut candidates: BTreeMap<PatternId, LearnedPattern> = BTreeMap::new();

        let mut targets = Vec::with_capacity(references.len());
        for reference in references {
            match normalize(&reference.url) {
                Ok(url) => targets.push((url, reference.label)),
                Err(e) => {
                    warn!(url = %reference.url, error = %e, "Skipping invalid reference URL");
                    report.unreachable += 1;
                }
            }
        }

        let fetched: Vec<_> = stream::iter(targets)
            .map(|(url, label)| async move {
                let result = fetcher.fetch(&url).await;
                (url, label, result)
            })
            .buffered(TRAINING_FETCH_CONCURRENCY)
            .collect()
            .await;

        for (url, label, result) in fetched {
            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    let err = CrawlerError::TrainingSourceUnreachable {
                        url: url.to_string(),
                    };
                    warn!(error = %err, cause = %e, "Skipping reference page");
                    report.unreachable += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let domain = host_key(&url);
            for sample in self.samples_for(&url, &domain, label, &raw) {
                add_candidate(&mut candidates, sample);
            }
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        for (id, candidate) in candidates {
            match table.get_mut(&id) {
                Some(existing) => existing.absorb(&candidate),
                None if candidate.support_count >= MIN_SUPPORT => {
                    table.insert(id, candidate);
                }
                None => {
                    debug!(
                        domain = %candidate.domain,
                        key = %candidate.key,
                        "Discarding pattern with a single example"
                    );
                    report.discarded += 1;
                }
            }
        }
        report.retained = table.len();

        info!(
            fetched = report.fetched,
            unreachable = report.unreachable,
            retained = report.retained,
            discarded = report.discarded,
            "Training pass complete"
        );
        report
    }

    fn samples_for(
        &self,
        url: &Url,
        domain: &str,
        label: PageType,
        raw: &crate::types::RawPage,
    ) -> Vec<LearnedPattern> {
        let seen = BTreeSet::from([url.to_string()]);
        let mut samples = vec![LearnedPattern {
            key: path_template(url),
            kind: PatternKind::UrlTemplate,
            page_type: label,
            confidence: pattern_confidence(1),
            support_count: 1,
            domain: domain.to_string(),
            profile: None,
            samples: seen.clone(),
        }];

        match self.extractor.parse(raw) {
            Ok(document) => samples.push(LearnedPattern {
                key: content_bucket(&document.features),
                kind: PatternKind::ContentSignature,
                page_type: label,
                confidence: pattern_confidence(1),
                support_count: 1,
                domain: domain.to_string(),
                profile: Some(FeatureProfile::from_features(&document.features)),
                samples: seen,
            }),
            Err(e) => {
                debug!(url = %url, error = %e, "Reference page not parseable, URL template only");
            }
        }

        samples
    }

    /// Merge patterns across subdomains of the same base domain.
    ///
    /// URL templates are unioned. Content signatures survive only when more
    /// than half of the merged subdomains carry them. Merged patterns are
    /// rescoped to the base domain with summed support.
    pub fn consolidate(&self) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);

        let mut groups: HashMap<String, Vec<LearnedPattern>> = HashMap::new();
        for pattern in table.values() {
            groups
                .entry(base_domain(&pattern.domain))
                .or_default()
                .push(pattern.clone());
        }

        let mut consolidated = BTreeMap::new();
        for (base, patterns) in groups {
            let subdomains: HashSet<&str> = patterns.iter().map(|p| p.domain.as_str()).collect();
            let member_count = subdomains.len();

            if member_count <= 1 {
                for pattern in patterns {
                    consolidated.insert(pattern.id(), pattern);
                }
                continue;
            }

            let mut merged: BTreeMap<PatternId, (LearnedPattern, HashSet<String>)> = BTreeMap::new();
            for pattern in &patterns {
                let mut rescoped = pattern.clone();
                rescoped.domain = base.clone();
                match merged.get_mut(&rescoped.id()) {
                    Some((existing, seen_in)) => {
                        existing.absorb(pattern);
                        seen_in.insert(pattern.domain.clone());
                    }
                    None => {
                        let seen_in = HashSet::from([pattern.domain.clone()]);
                        merged.insert(rescoped.id(), (rescoped, seen_in));
                    }
                }
            }

            for (id, (pattern, seen_in)) in merged {
                let keep = match pattern.kind {
                    PatternKind::UrlTemplate => true,
                    PatternKind::ContentSignature => seen_in.len() * 2 > member_count,
                };
                if keep && pattern.support_count >= MIN_SUPPORT {
                    consolidated.insert(id, pattern);
                } else {
                    debug!(base = %base, key = %pattern.key, "Dropping pattern during consolidation");
                }
            }

            debug!(base = %base, subdomains = member_count, "Consolidated subdomain patterns");
        }

        *table = consolidated;
        info!(patterns = table.len(), "Pattern table consolidated");
    }

    /// Best URL-template match for `url`.
    ///
    /// `score = 0.4 * domain_match + 0.3 * template_match + 0.3 * confidence`.
    /// Patterns whose template shares no structure with the URL never match.
    pub fn match_url(&self, url: &Url) -> Option<PatternMatch> {
        let host = host_key(url);
        let base = base_domain(&host);
        let template = path_template(url);

        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .values()
            .filter(|p| p.kind == PatternKind::UrlTemplate)
            .filter_map(|p| {
                let template_match = template_similarity(&template, &p.key);
                if template_match <= 0.0 {
                    return None;
                }
                let domain_match = domain_match(&host, &base, &p.domain);
                let score = 0.4 * domain_match + 0.3 * template_match + 0.3 * p.confidence;
                Some(PatternMatch {
                    pattern: p.clone(),
                    score,
                })
            })
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// Best content-signature score per page type for these features.
    pub fn content_scores(&self, url: &Url, features: &ContentFeatures) -> Vec<(PageType, f32)> {
        let host = host_key(url);
        let base = base_domain(&host);
        let observed = FeatureProfile::from_features(features);

        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut best: BTreeMap<PageType, f32> = BTreeMap::new();
        for pattern in table.values().filter(|p| p.kind == PatternKind::ContentSignature) {
            let Some(profile) = &pattern.profile else {
                continue;
            };
            let mut score = 0.7 * profile.similarity(&observed) + 0.3 * pattern.confidence;
            if domain_match(&host, &base, &pattern.domain) == 0.0 {
                score *= 0.8;
            }
            let entry = best.entry(pattern.page_type).or_insert(0.0);
            *entry = entry.max(score);
        }

        best.into_iter().collect()
    }

    pub fn patterns(&self) -> Vec<LearnedPattern> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn export(&self) -> PatternTable {
        PatternTable {
            version: TABLE_VERSION,
            exported_at: Utc::now(),
            patterns: self.patterns(),
        }
    }

    /// Restore patterns. Entries with the same identity are replaced, so
    /// importing the same table twice leaves the learner unchanged.
    pub fn import(&self, table: PatternTable) -> usize {
        let mut current = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let mut imported = 0;
        for mut pattern in table.patterns {
            if pattern.support_count < MIN_SUPPORT {
                continue;
            }
            pattern.confidence = pattern_confidence(pattern.support_count);
            current.insert(pattern.id(), pattern);
            imported += 1;
        }
        imported
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    pub fn import_json(&self, json: &str) -> Result<usize> {
        let table: PatternTable = serde_json::from_str(json)?;
        Ok(self.import(table))
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.export_json()?;
        tokio::fs::write(path.as_ref(), json).await?;
        info!(path = %path.as_ref().display(), patterns = self.len(), "Pattern table saved");
        Ok(())
    }

    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        let imported = self.import_json(&json)?;
        info!(path = %path.as_ref().display(), imported, "Pattern table loaded");
        Ok(imported)
    }
}

fn add_candidate(candidates: &mut BTreeMap<PatternId, LearnedPattern>, sample: LearnedPattern) {
    match candidates.get_mut(&sample.id()) {
        Some(existing) => existing.absorb(&sample),
        None => {
            candidates.insert(sample.id(), sample);
        }
    }
}

fn domain_match(host: &str, base: &str, pattern_domain: &str) -> f32 {
    if host == pattern_domain {
        1.0
    } else if base == pattern_domain || base == base_domain(pattern_domain) {
        0.8
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::testing::MockFetcher;
    use proptest::prelude::*;

    const PROPERTY_BODY: &str = r#"<html><body>
        <h1>Apartamento 3 quartos</h1><p>R$ 450.000</p>
        <div class="galeria"><img src="1.jpg"><img src="2.jpg"><img src="3.jpg"></div>
        <ul class="detalhes"><li>Área útil 90 m²</li><li>2 vagas</li><li>Condomínio</li></ul>
        </body></html>"#;

    fn learner() -> PatternLearner {
        let extractor = FeatureExtractor::new(&ClassifierConfig::default()).unwrap();
        PatternLearner::new(Arc::new(extractor))
    }

    fn fetcher_with(urls: &[&str]) -> MockFetcher {
        urls.iter()
            .fold(MockFetcher::new(), |f, url| f.with_html(*url, PROPERTY_BODY))
    }

    #[tokio::test]
    async fn test_train_keeps_only_supported_patterns() {
        let urls = [
            "https://imob.com.br/imovel/apartamento-3-quartos-centro-101",
            "https://imob.com.br/imovel/casa-2-quartos-jardim-202",
            "https://imob.com.br/sobre/historia",
        ];
        let fetcher = fetcher_with(&urls);
        let learner = learner();

        let refs: Vec<_> = urls.iter().map(|u| ReferenceUrl::property(*u)).collect();
        let report = learner.train(&refs, &fetcher).await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.discarded, 1);
        for pattern in learner.patterns() {
            assert!(pattern.support_count >= MIN_SUPPORT);
        }
        assert!(learner
            .patterns()
            .iter()
            .any(|p| p.kind == PatternKind::UrlTemplate && p.key == "/imovel/{slug}-{id}"));
    }

    #[tokio::test]
    async fn test_unreachable_reference_is_skipped() {
        let fetcher = fetcher_with(&[
            "https://imob.com.br/imovel/1",
            "https://imob.com.br/imovel/2",
        ])
        .fail_url("https://imob.com.br/imovel/3");
        let learner = learner();

        let refs = vec![
            ReferenceUrl::property("https://imob.com.br/imovel/1"),
            ReferenceUrl::property("https://imob.com.br/imovel/3"),
            ReferenceUrl::property("https://imob.com.br/imovel/2"),
            ReferenceUrl::property("not a url"),
        ];
        let report = learner.train(&refs, &fetcher).await;

        assert_eq!(report.fetched, 2);
        assert_eq!(report.unreachable, 2);
        assert!(!learner.is_empty());
    }

    #[tokio::test]
    async fn test_consolidate_merges_subdomains() {
        let urls = [
            "https://sp.imob.com.br/imovel/10",
            "https://sp.imob.com.br/imovel/11",
            "https://rj.imob.com.br/imovel/20",
            "https://rj.imob.com.br/imovel/21",
            "https://rj.imob.com.br/imovel/22",
        ];
        let fetcher = fetcher_with(&urls);
        let learner = learner();
        let refs: Vec<_> = urls.iter().map(|u| ReferenceUrl::property(*u)).collect();
        learner.train(&refs, &fetcher).await;

        learner.consolidate();

        let template = learner
            .patterns()
            .into_iter()
            .find(|p| p.kind == PatternKind::UrlTemplate)
            .unwrap();
        assert_eq!(template.domain, "imob.com.br");
        assert_eq!(template.support_count, 5);
        assert_eq!(template.confidence, pattern_confidence(5));
        assert!(learner.patterns().iter().all(|p| p.support_count >= MIN_SUPPORT));
    }

    #[tokio::test]
    async fn test_match_url_prefers_same_domain() {
        let urls = ["https://imob.com.br/imovel/1", "https://imob.com.br/imovel/2"];
        let fetcher = fetcher_with(&urls);
        let learner = learner();
        let refs: Vec<_> = urls.iter().map(|u| ReferenceUrl::property(*u)).collect();
        learner.train(&refs, &fetcher).await;

        let same = learner
            .match_url(&Url::parse("https://imob.com.br/imovel/999").unwrap())
            .unwrap();
        let other = learner
            .match_url(&Url::parse("https://outra.com.br/imovel/999").unwrap())
            .unwrap();

        assert!((same.score - (0.4 + 0.3 + 0.3 * pattern_confidence(2))).abs() < 1e-6);
        assert!(other.score < same.score);
        assert!(learner
            .match_url(&Url::parse("https://imob.com.br/contato").unwrap())
            .is_none());
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let urls = ["https://imob.com.br/imovel/1", "https://imob.com.br/imovel/2"];
        let fetcher = fetcher_with(&urls);
        let source = learner();
        let refs: Vec<_> = urls.iter().map(|u| ReferenceUrl::property(*u)).collect();
        source.train(&refs, &fetcher).await;
        let json = source.export_json().unwrap();

        let target = learner();
        target.import_json(&json).unwrap();
        let once = target.patterns();
        target.import_json(&json).unwrap();

        assert_eq!(once, target.patterns());
        assert_eq!(once, source.patterns());
    }

    #[tokio::test]
    async fn test_retraining_same_references_is_stable() {
        let urls = [
            "https://imob.com.br/imovel/1",
            "https://imob.com.br/imovel/2",
            "https://imob.com.br/imovel/3",
        ];
        let fetcher = fetcher_with(&urls);
        let learner = learner();
        let refs: Vec<_> = urls[..2].iter().map(|u| ReferenceUrl::property(*u)).collect();

        learner.train(&refs, &fetcher).await;
        let first = learner.patterns();
        learner.train(&refs, &fetcher).await;
        assert_eq!(learner.patterns(), first);

        // Reloading an exported table and training again counts nothing twice
        let reloaded = self::learner();
        reloaded.import_json(&learner.export_json().unwrap()).unwrap();
        reloaded.train(&refs, &fetcher).await;
        assert_eq!(reloaded.patterns(), first);

        let template = |l: &PatternLearner| {
            l.patterns()
                .into_iter()
                .find(|p| p.kind == PatternKind::UrlTemplate)
                .unwrap()
        };
        assert_eq!(template(&learner).support_count, 2);

        learner
            .train(&[ReferenceUrl::property(urls[2])], &fetcher)
            .await;
        let grown = template(&learner);
        assert_eq!(grown.support_count, 3);
        assert_eq!(grown.confidence, pattern_confidence(3));
        assert_eq!(grown.samples.len(), 3);
    }

    #[test]
    fn test_profile_similarity_is_symmetric() {
        let a = FeatureProfile {
            price_count: 1.0,
            detail_density: 3.0,
            link_count: 40.0,
            image_count: 12.0,
            pagination: 0.0,
            filters: 0.0,
            samples: 1,
        };
        let b = FeatureProfile {
            price_count: 12.0,
            detail_density: 0.5,
            link_count: 120.0,
            image_count: 30.0,
            pagination: 1.0,
            filters: 1.0,
            samples: 1,
        };
        assert_eq!(a.similarity(&b), b.similarity(&a));
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
        assert!(a.similarity(&b) < 0.5);
    }

    proptest! {
        #[test]
        fn confidence_is_monotonic_and_bounded(support in 1u32..200) {
            let c = pattern_confidence(support);
            prop_assert!((0.3..=0.95).contains(&c));
            prop_assert!(pattern_confidence(support + 1) >= c);
        }
    }
}
