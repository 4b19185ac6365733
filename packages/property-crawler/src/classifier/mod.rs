//! Page classifier.
//!
//! One ordered pipeline of scoring stages, parameterized by [`Tier`]. The
//! permissive tier drives navigation; the strict tier gates persistence and
//! never answers Property when a catalog phrase is present.

pub mod stages;

use std::sync::Arc;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::document::PageDocument;
use crate::learner::PatternLearner;
use crate::text::fold;
use crate::types::{ClassificationVerdict, Signal, StageKind, Tier};

use stages::StageContext;

pub struct PageClassifier {
    config: ClassifierConfig,
    catalog_phrases: Vec<String>,
    property_phrases: Vec<String>,
    learner: Option<Arc<PatternLearner>>,
}

impl PageClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let catalog_phrases = config.catalog_phrases.iter().map(|p| fold(p)).collect();
        let property_phrases = config.property_phrases.iter().map(|p| fold(p)).collect();
        Self {
            config,
            catalog_phrases,
            property_phrases,
            learner: None,
        }
    }

    /// Enable the pattern-table stage.
    pub fn with_learner(mut self, learner: Arc<PatternLearner>) -> Self {
        self.learner = Some(learner);
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, document: &PageDocument, tier: Tier) -> ClassificationVerdict {
        let ctx = StageContext {
            document,
            tier,
            config: &self.config,
            thresholds: self.config.thresholds(tier),
            learner: self.learner.as_deref(),
            catalog_hits: matches(&document.folded_text, &self.catalog_phrases),
            property_hits: matches(&document.folded_text, &self.property_phrases),
        };

        let verdict = stages::pipeline(tier)
            .iter()
            .find_map(|stage| stages::run(*stage, &ctx))
            .unwrap_or_else(|| ClassificationVerdict::unknown(tier));

        debug!(
            url = %document.final_url,
            tier = tier.as_str(),
            stage = verdict.stage.as_str(),
            page_type = %verdict.page_type,
            confidence = verdict.confidence,
            "Classified page"
        );
        verdict
    }

    /// Verdict for a page that could not be parsed.
    pub fn unparseable(&self, reason: impl Into<String>, tier: Tier) -> ClassificationVerdict {
        ClassificationVerdict::new(crate::types::PageType::Unknown, 0.0, StageKind::Fallthrough, tier)
            .with_signals(vec![Signal::ParseFailure {
                reason: reason.into(),
            }])
    }
}

/// Distinct phrases present in folded text.
fn matches(folded: &str, phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .filter(|p| !p.is_empty() && folded.contains(p.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FeatureExtractor;
    use crate::types::{PageType, RawPage};
    use proptest::prelude::*;
    use url::Url;

    fn document(url: &str, body: &str) -> PageDocument {
        let config = ClassifierConfig::default();
        let raw = RawPage::new(Url::parse(url).unwrap(), body);
        FeatureExtractor::new(&config).unwrap().parse(&raw).unwrap()
    }

    fn classifier() -> PageClassifier {
        PageClassifier::new(ClassifierConfig::default())
    }

    #[test]
    fn test_catalog_phrase_is_lexical_catalog() {
        let doc = document(
            "https://imob.com.br/venda",
            "<html><body><p>32 Resultados Encontrados</p><p>Ordenar por: menor preço</p></body></html>",
        );
        let verdict = classifier().classify(&doc, Tier::Permissive);
        assert_eq!(verdict.page_type, PageType::Catalog);
        assert_eq!(verdict.stage, StageKind::Lexical);
        assert_eq!(verdict.confidence, 0.95);
    }

    #[test]
    fn test_property_phrase_accent_insensitive() {
        let doc = document(
            "https://imob.com.br/imovel/1",
            "<html><body><p>CODIGO DO IMOVEL: 1234</p></body></html>",
        );
        let verdict = classifier().classify(&doc, Tier::Permissive);
        assert_eq!(verdict.page_type, PageType::Property);
        assert_eq!(verdict.confidence, 0.9);
    }

    #[test]
    fn test_single_phrase_is_not_enough_for_strict() {
        let doc = document(
            "https://imob.com.br/imovel/1",
            "<html><body><p>Agendar visita</p></body></html>",
        );
        let verdict = classifier().classify(&doc, Tier::Strict);
        assert_eq!(verdict.page_type, PageType::Unknown);
        assert_eq!(verdict.stage, StageKind::StrictEvidence);
    }

    #[test]
    fn test_many_prices_mean_catalog() {
        let items: String = (1..=6)
            .map(|i| format!("<li>Apartamento R$ {i}00.000</li>"))
            .collect();
        let doc = document(
            "https://imob.com.br/apartamentos",
            &format!("<html><body><ul>{items}</ul></body></html>"),
        );
        let verdict = classifier().classify(&doc, Tier::Permissive);
        assert_eq!(verdict.page_type, PageType::Catalog);
        assert_eq!(verdict.stage, StageKind::CountHeuristic);
    }

    #[test]
    fn test_structural_property() {
        let doc = document(
            "https://imob.com.br/x/1",
            r#"<html><body>
            <div class="gallery"><img src="1"><img src="2"><img src="3"><img src="4"></div>
            <dl class="ficha"><dt>Área</dt><dd>80 m²</dd></dl>
            <p>R$ 300.000</p></body></html>"#,
        );
        let verdict = classifier().classify(&doc, Tier::Permissive);
        assert_eq!(verdict.page_type, PageType::Property);
        assert_eq!(verdict.stage, StageKind::Structural);
        assert!(verdict.signals.contains(&Signal::DetailBlock));
    }

    #[test]
    fn test_structural_needs_margin() {
        // Cards and a gallery in equal measure
        let cards: String = (0..3)
            .map(|i| format!(r#"<div class="card"><a href="/x/{i}">x</a></div>"#))
            .collect();
        let doc = document(
            "https://imob.com.br/x",
            &format!(
                r#"<html><body>{cards}<div class="gallery"><img src="1"><img src="2"><img src="3"></div></body></html>"#
            ),
        );
        let verdict = classifier().classify(&doc, Tier::Permissive);
        assert_eq!(verdict.page_type, PageType::Unknown);
        assert_eq!(verdict.stage, StageKind::Structural);
    }

    #[test]
    fn test_strict_corroborated_evidence() {
        let doc = document(
            "https://imob.com.br/imovel/1",
            r#"<html><body><h2>R$ 450.000</h2><p>Rua das Palmeiras, 45</p>
            <ul class="caracteristicas"><li>3 quartos</li></ul></body></html>"#,
        );
        let verdict = classifier().classify(&doc, Tier::Strict);
        assert_eq!(verdict.page_type, PageType::Property);
        assert_eq!(verdict.stage, StageKind::StrictEvidence);
    }

    #[test]
    fn test_price_count_at_threshold_is_not_catalog() {
        // Asking price, condominium fee and property tax on one listing
        let body = |extra: &str| {
            format!(
                r#"<html><body><h2>Venda R$ 450.000</h2>
                <p>Condomínio R$ 800</p><p>IPTU R$ 120</p>{extra}
                <p>Rua das Palmeiras, 45 - Centro</p>
                <ul class="caracteristicas"><li>3 quartos</li><li>2 vagas</li></ul>
                </body></html>"#
            )
        };

        let doc = document("https://imob.com.br/imovel/45", &body(""));
        assert_eq!(doc.features.price_count, 3);
        let verdict = classifier().classify(&doc, Tier::Strict);
        assert_eq!(verdict.page_type, PageType::Property);
        assert_eq!(verdict.stage, StageKind::StrictEvidence);

        let doc = document("https://imob.com.br/imovel/45", &body("<p>Taxa R$ 90</p>"));
        let verdict = classifier().classify(&doc, Tier::Strict);
        assert_eq!(verdict.page_type, PageType::Catalog);
        assert_eq!(verdict.stage, StageKind::CountHeuristic);
    }

    #[test]
    fn test_empty_page_is_unknown() {
        let doc = document("https://imob.com.br/", "<html><body><p>Olá</p></body></html>");
        let verdict = classifier().classify(&doc, Tier::Permissive);
        assert_eq!(verdict.page_type, PageType::Unknown);
        assert_eq!(verdict.stage, StageKind::Fallthrough);
    }

    proptest! {
        #[test]
        fn strict_never_property_with_catalog_phrase(
            property_phrases in 0usize..5,
            gallery in 0usize..8,
            prices in 0usize..3,
            address in any::<bool>(),
            detail in any::<bool>(),
            catalog_idx in 0usize..9,
        ) {
            let config = ClassifierConfig::default();
            let mut body = String::from("<html><body>");
            body.push_str(&format!("<p>{}</p>", config.catalog_phrases[catalog_idx % config.catalog_phrases.len()]));
            for phrase in config.property_phrases.iter().take(property_phrases) {
                body.push_str(&format!("<p>{phrase}</p>"));
            }
            body.push_str(r#"<div class="galeria">"#);
            for i in 0..gallery {
                body.push_str(&format!(r#"<img src="{i}.jpg">"#));
            }
            body.push_str("</div>");
            for i in 0..prices {
                body.push_str(&format!("<p>R$ {}50.000</p>", i + 1));
            }
            if address {
                body.push_str("<p>Rua das Acácias, 99</p>");
            }
            if detail {
                body.push_str(r#"<ul class="detalhes"><li>Área útil 70 m²</li></ul>"#);
            }
            body.push_str("</body></html>");

            let doc = document("https://imob.com.br/imovel/123", &body);
            let verdict = PageClassifier::new(config).classify(&doc, Tier::Strict);
            prop_assert_ne!(verdict.page_type, PageType::Property);
        }
    }
}
