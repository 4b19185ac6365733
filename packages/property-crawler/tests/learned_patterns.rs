//! Training, consolidation and pattern-driven classification.

use std::sync::Arc;

use property_crawler::learner::{PatternKind, MIN_SUPPORT};
use property_crawler::testing::MockFetcher;
use property_crawler::{
    ClassifierConfig, FeatureExtractor, PageClassifier, PageType, PatternLearner, RawPage,
    ReferenceUrl, StageKind, Tier,
};
use url::Url;

const LISTING: &str = r#"<html><body>
    <h1>Apartamento 2 quartos</h1><p>R$ 380.000</p>
    <div class="galeria"><img src="a.jpg"><img src="b.jpg"><img src="c.jpg"><img src="d.jpg"></div>
    <ul class="detalhes"><li>Área útil 70 m²</li><li>1 vaga</li><li>Condomínio</li></ul>
    </body></html>"#;

fn extractor() -> Arc<FeatureExtractor> {
    Arc::new(FeatureExtractor::new(&ClassifierConfig::default()).unwrap())
}

async fn trained(urls: &[&str]) -> PatternLearner {
    let fetcher = urls
        .iter()
        .fold(MockFetcher::new(), |f, url| f.with_html(*url, LISTING));
    let learner = PatternLearner::new(extractor());
    let references: Vec<_> = urls.iter().map(|u| ReferenceUrl::property(*u)).collect();
    learner.train(&references, &fetcher).await;
    learner
}

#[tokio::test]
async fn test_consolidated_patterns_have_support() {
    let learner = trained(&[
        "https://zona-sul.imob.com.br/imovel/apartamento-jardins-3101",
        "https://zona-sul.imob.com.br/imovel/casa-moema-3102",
        "https://zona-norte.imob.com.br/imovel/apartamento-santana-4101",
        "https://zona-norte.imob.com.br/imovel/sobrado-tucuruvi-4102",
    ])
    .await;

    learner.consolidate();

    let patterns = learner.patterns();
    assert!(!patterns.is_empty());
    assert!(patterns.iter().all(|p| p.support_count >= MIN_SUPPORT));
    assert!(patterns.iter().all(|p| p.domain == "imob.com.br"));

    let template = patterns
        .iter()
        .find(|p| p.kind == PatternKind::UrlTemplate)
        .unwrap();
    assert_eq!(template.key, "/imovel/{slug}-{id}");
    assert_eq!(template.support_count, 4);
}

#[tokio::test]
async fn test_learned_patterns_classify_unlabelled_listing() {
    let learner = Arc::new(
        trained(&[
            "https://imob.com.br/imovel/apartamento-centro-201",
            "https://imob.com.br/imovel/apartamento-bela-vista-202",
            "https://imob.com.br/imovel/cobertura-moema-203",
        ])
        .await,
    );
    let classifier = PageClassifier::new(ClassifierConfig::default()).with_learner(learner);

    let url = Url::parse("https://imob.com.br/imovel/studio-pinheiros-204").unwrap();
    let document = extractor().parse(&RawPage::new(url, LISTING)).unwrap();
    let verdict = classifier.classify(&document, Tier::Permissive);

    assert_eq!(verdict.page_type, PageType::Property);
    assert_eq!(verdict.stage, StageKind::PatternTable);
    assert!(verdict.confidence >= 0.1);
}

#[tokio::test]
async fn test_pattern_table_survives_file_round_trip() {
    let learner = trained(&[
        "https://imob.com.br/imovel/apartamento-centro-201",
        "https://imob.com.br/imovel/apartamento-bela-vista-202",
    ])
    .await;
    let path = std::env::temp_dir().join(format!("patterns-{}.json", std::process::id()));

    learner.save_to_file(&path).await.unwrap();
    let restored = PatternLearner::new(extractor());
    let loaded = restored.load_from_file(&path).await.unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, learner.len());
    assert_eq!(restored.patterns(), learner.patterns());
}
