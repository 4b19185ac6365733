//! Scoring stages of the classifier pipeline.
//!
//! Each stage either decides (returns a verdict) or stays silent and lets the
//! next stage run.

use std::collections::BTreeMap;

use crate::config::{ClassifierConfig, TierThresholds};
use crate::document::PageDocument;
use crate::learner::PatternLearner;
use crate::types::{ClassificationVerdict, PageType, Signal, StageKind, Tier};

/// Content similarity below this never contributes to a pattern verdict
const CONTENT_FLOOR: f32 = 0.65;

/// Minimum structural score before the structural stage has an opinion
const STRUCTURAL_FLOOR: f32 = 0.3;

const PERMISSIVE_STAGES: &[StageKind] = &[
    StageKind::Lexical,
    StageKind::CountHeuristic,
    StageKind::PatternTable,
    StageKind::Structural,
];

const STRICT_STAGES: &[StageKind] = &[
    StageKind::Lexical,
    StageKind::CountHeuristic,
    StageKind::StrictEvidence,
];

/// Ordered stages for a tier.
pub fn pipeline(tier: Tier) -> &'static [StageKind] {
    match tier {
        Tier::Permissive => PERMISSIVE_STAGES,
        Tier::Strict => STRICT_STAGES,
    }
}

/// Everything a stage may look at, computed once per page
pub struct StageContext<'a> {
    pub document: &'a PageDocument,
    pub tier: Tier,
    pub config: &'a ClassifierConfig,
    pub thresholds: &'a TierThresholds,
    pub learner: Option<&'a PatternLearner>,
    pub catalog_hits: Vec<String>,
    pub property_hits: Vec<String>,
}

impl StageContext<'_> {
    fn verdict(&self, page_type: PageType, confidence: f32, stage: StageKind) -> ClassificationVerdict {
        ClassificationVerdict::new(page_type, confidence, stage, self.tier)
    }

    fn phrase_signals(&self) -> Vec<Signal> {
        let mut signals = Vec::new();
        if !self.catalog_hits.is_empty() {
            signals.push(Signal::PhraseMatch {
                class: PageType::Catalog,
                phrases: self.catalog_hits.clone(),
            });
        }
        if !self.property_hits.is_empty() {
            signals.push(Signal::PhraseMatch {
                class: PageType::Property,
                phrases: self.property_hits.clone(),
            });
        }
        signals
    }
}

pub fn run(stage: StageKind, ctx: &StageContext<'_>) -> Option<ClassificationVerdict> {
    match stage {
        StageKind::Lexical => lexical(ctx),
        StageKind::CountHeuristic => count_heuristic(ctx),
        StageKind::PatternTable => pattern_table(ctx),
        StageKind::Structural => structural(ctx),
        StageKind::StrictEvidence => strict_evidence(ctx),
        StageKind::Fallthrough => None,
    }
}

/// Curated phrases. A catalog phrase always wins, in both tiers.
fn lexical(ctx: &StageContext<'_>) -> Option<ClassificationVerdict> {
    if !ctx.catalog_hits.is_empty() {
        let confidence = if ctx.catalog_hits.len() >= 2 {
            ctx.config.lexical_confidence_strong
        } else {
            ctx.config.lexical_confidence
        };
        return Some(
            ctx.verdict(PageType::Catalog, confidence, StageKind::Lexical)
                .with_signals(ctx.phrase_signals()),
        );
    }

    let hits = ctx.property_hits.len();
    if hits > 0 && hits >= ctx.thresholds.min_property_phrases {
        let confidence = if hits >= 2 {
            ctx.config.lexical_confidence_strong
        } else {
            ctx.config.lexical_confidence
        };
        return Some(
            ctx.verdict(PageType::Property, confidence, StageKind::Lexical)
                .with_signals(ctx.phrase_signals()),
        );
    }

    None
}

/// Many prices or repeated room keywords mean a listing of several units.
fn count_heuristic(ctx: &StageContext<'_>) -> Option<ClassificationVerdict> {
    let features = &ctx.document.features;
    let prices = features.price_count > ctx.thresholds.price_catalog_threshold;
    let rooms = features.room_keyword_count > ctx.thresholds.room_catalog_threshold;
    if !prices && !rooms {
        return None;
    }

    let mut signals = Vec::new();
    if prices {
        signals.push(Signal::PriceCount {
            count: features.price_count,
        });
    }
    if rooms {
        signals.push(Signal::RoomKeywordCount {
            count: features.room_keyword_count,
        });
    }
    let confidence = if prices && rooms { 0.85 } else { 0.75 };

    Some(ctx.verdict(PageType::Catalog, confidence, StageKind::CountHeuristic).with_signals(signals))
}

/// Blend of the learned URL-template match and content-signature similarity.
fn pattern_table(ctx: &StageContext<'_>) -> Option<ClassificationVerdict> {
    let learner = ctx.learner?;
    if learner.is_empty() {
        return None;
    }

    let url = &ctx.document.final_url;
    let mut url_scores: BTreeMap<PageType, f32> = BTreeMap::new();
    let mut signals = Vec::new();

    if let Some(found) = learner.match_url(url) {
        url_scores.insert(found.pattern.page_type, found.score);
        signals.push(Signal::UrlPattern {
            pattern: found.pattern.key.clone(),
            score: found.score,
        });
    }

    let mut content_scores: BTreeMap<PageType, f32> = BTreeMap::new();
    for (class, score) in learner.content_scores(url, &ctx.document.features) {
        if score >= CONTENT_FLOOR {
            content_scores.insert(class, score);
            signals.push(Signal::ContentSimilarity { class, score });
        }
    }

    let blended = |class: PageType| {
        0.5 * url_scores.get(&class).copied().unwrap_or(0.0)
            + 0.5 * content_scores.get(&class).copied().unwrap_or(0.0)
    };
    let property = blended(PageType::Property);
    let catalog = blended(PageType::Catalog);

    let (winner, score) = if property > catalog {
        (PageType::Property, property)
    } else if catalog > property {
        (PageType::Catalog, catalog)
    } else {
        return None;
    };

    if score < ctx.thresholds.pattern_min_score {
        return None;
    }

    Some(ctx.verdict(winner, score, StageKind::PatternTable).with_signals(signals))
}

/// Repeated cards against gallery plus detail block. Without a clear margin
/// the page is Unknown.
fn structural(ctx: &StageContext<'_>) -> Option<ClassificationVerdict> {
    let features = &ctx.document.features;
    let mut signals = Vec::new();

    let mut catalog = 0.0f32;
    if features.card_count >= ctx.config.min_repeated_cards {
        let extra = (features.card_count - ctx.config.min_repeated_cards) as f32;
        catalog += (0.5 + 0.05 * extra).min(0.7);
        signals.push(Signal::CardContainers {
            count: features.card_count,
        });
    }
    if features.has_pagination {
        catalog += 0.15;
        signals.push(Signal::Pagination);
    }
    if features.has_filters {
        catalog += 0.1;
        signals.push(Signal::Filters);
    }

    let mut property = 0.0f32;
    if features.gallery_images >= ctx.config.min_gallery_images {
        property += 0.4;
        signals.push(Signal::Gallery {
            images: features.gallery_images,
        });
    }
    if features.has_detail_block {
        property += 0.3;
        signals.push(Signal::DetailBlock);
    }
    if features.has_address {
        property += 0.1;
        signals.push(Signal::AddressPresent);
    }
    if (1..=2).contains(&features.price_count) {
        property += 0.1;
    }

    if catalog < STRUCTURAL_FLOOR && property < STRUCTURAL_FLOOR {
        return None;
    }

    let verdict = if (property - catalog).abs() < ctx.thresholds.structural_margin {
        ctx.verdict(PageType::Unknown, 0.0, StageKind::Structural)
    } else if property > catalog {
        ctx.verdict(PageType::Property, property.min(0.9), StageKind::Structural)
    } else {
        ctx.verdict(PageType::Catalog, catalog.min(0.9), StageKind::Structural)
    };

    Some(verdict.with_signals(signals))
}

/// Last strict stage: Property only on independent corroboration, otherwise
/// Unknown.
fn strict_evidence(ctx: &StageContext<'_>) -> Option<ClassificationVerdict> {
    let features = &ctx.document.features;
    let mut signals = ctx.phrase_signals();

    if ctx.property_hits.len() >= 2 {
        return Some(ctx.verdict(PageType::Property, 0.9, StageKind::StrictEvidence).with_signals(signals));
    }

    let corroborated = features.price_count >= 1 && features.has_address && features.has_detail_block;
    if corroborated {
        signals.push(Signal::PriceCount {
            count: features.price_count,
        });
        signals.push(Signal::AddressPresent);
        signals.push(Signal::DetailBlock);
        return Some(ctx.verdict(PageType::Property, 0.85, StageKind::StrictEvidence).with_signals(signals));
    }

    Some(ctx.verdict(PageType::Unknown, 0.0, StageKind::StrictEvidence).with_signals(signals))
}
